//! Bounded-parallelism work pool with index-ordered results.
//!
//! N inputs are pushed onto one shared queue, W worker threads pull from it,
//! and a single aggregator files each result into the slot of its original
//! index. Completion order never leaks into the output.

use crate::error::{DubError, Result};
use crate::exec::cancel::CancelToken;
use crate::exec::gate::ResourceGate;
use crate::exec::progress::{ProgressEvent, ProgressSender};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One unit of work and its position in the original sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<T> {
    pub index: usize,
    pub payload: T,
}

/// State of a result slot.
#[derive(Debug)]
pub enum Outcome<R> {
    /// Never processed (the run was cancelled or aborted first).
    Pending,
    Done(R),
    Failed(DubError),
}

/// Result slot for one work item.
#[derive(Debug)]
pub struct WorkResult<R> {
    pub index: usize,
    pub outcome: Outcome<R>,
}

impl<R> WorkResult<R> {
    pub fn value(&self) -> Option<&R> {
        match &self.outcome {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DubError> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, Outcome::Pending)
    }
}

/// Everything a finished run produced, addressable by original index.
#[derive(Debug)]
pub struct PoolReport<R> {
    /// Always one slot per submitted item, in submission order.
    pub results: Vec<WorkResult<R>>,
    /// Number of items that finished (successfully or not).
    pub completed: usize,
    /// Whether the caller's cancel token fired during the run.
    pub cancelled: bool,
    first_failure: Option<usize>,
}

impl<R> PoolReport<R> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when every slot holds a value.
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.outcome, Outcome::Done(_)))
    }

    /// Failed items in index order.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &DubError)> {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.index, e)))
    }

    /// Index of the item whose failure arrived first, if any.
    pub fn first_failure(&self) -> Option<usize> {
        self.first_failure
    }

    /// Values by index; `None` for failed or never-processed items.
    pub fn into_values(self) -> Vec<Option<R>> {
        self.results
            .into_iter()
            .map(|r| match r.outcome {
                Outcome::Done(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Split into values by index and the list of failures, each tagged with its index.
    pub fn into_parts(self) -> (Vec<Option<R>>, Vec<DubError>) {
        let mut values = Vec::with_capacity(self.results.len());
        let mut errors = Vec::new();
        for result in self.results {
            match result.outcome {
                Outcome::Done(value) => values.push(Some(value)),
                Outcome::Failed(error) => {
                    values.push(None);
                    errors.push(DubError::at_item(result.index, error));
                }
                Outcome::Pending => values.push(None),
            }
        }
        (values, errors)
    }

    /// Fail-fast view: the first failure, or `Cancelled` if any slot is empty.
    pub fn into_ordered(mut self) -> Result<Vec<R>> {
        if let Some(index) = self.first_failure {
            let slot = std::mem::replace(&mut self.results[index].outcome, Outcome::Pending);
            if let Outcome::Failed(error) = slot {
                return Err(DubError::at_item(index, error));
            }
        }
        self.results
            .into_iter()
            .map(|r| match r.outcome {
                Outcome::Done(value) => Ok(value),
                Outcome::Failed(error) => Err(DubError::at_item(r.index, error)),
                Outcome::Pending => Err(DubError::Cancelled),
            })
            .collect()
    }
}

/// Bounded-parallelism executor.
///
/// Cloning a pool shares its cancel token, gate and progress stream.
#[derive(Debug, Clone)]
pub struct WorkPool {
    name: &'static str,
    workers: usize,
    cancel: CancelToken,
    gate: Option<Arc<ResourceGate>>,
    progress: Option<ProgressSender>,
}

impl WorkPool {
    /// Create a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            name: "pool",
            workers: workers.max(1),
            cancel: CancelToken::new(),
            gate: None,
            progress: None,
        }
    }

    /// Name reported in progress events and logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Share a cancellation signal with the caller.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Hold a slot of `gate` around every call to `process`.
    pub fn with_gate(mut self, gate: Arc<ResourceGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Publish a `ProgressEvent` after each completed item.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fail-fast run: the first error stops further dequeuing and is returned,
    /// tagged with the index of the item that produced it.
    ///
    /// Returns `Cancelled` if the cancel token fired before every item ran.
    ///
    /// # Panics
    /// Propagates a panic raised by `process`.
    pub fn run<T, R, F>(&self, payloads: Vec<T>, process: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(WorkItem<T>) -> Result<R> + Sync,
    {
        self.execute(payloads, &process, true).into_ordered()
    }

    /// Collect-all run: every item is attempted (unless cancelled) and the
    /// full result set is returned alongside its failures.
    ///
    /// # Panics
    /// Propagates a panic raised by `process`.
    pub fn run_collect_all<T, R, F>(&self, payloads: Vec<T>, process: F) -> PoolReport<R>
    where
        T: Send,
        R: Send,
        F: Fn(WorkItem<T>) -> Result<R> + Sync,
    {
        self.execute(payloads, &process, false)
    }

    /// Start a collect-all run on a background thread.
    pub fn spawn<T, R, F>(&self, payloads: Vec<T>, process: F) -> PoolHandle<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(WorkItem<T>) -> Result<R> + Send + Sync + 'static,
    {
        let pool = self.clone();
        let cancel = self.cancel.clone();
        let join = thread::spawn(move || pool.run_collect_all(payloads, process));
        PoolHandle { join, cancel }
    }

    fn execute<T, R, F>(&self, payloads: Vec<T>, process: &F, fail_fast: bool) -> PoolReport<R>
    where
        T: Send,
        R: Send,
        F: Fn(WorkItem<T>) -> Result<R> + Sync,
    {
        let total = payloads.len();
        let mut results: Vec<WorkResult<R>> = (0..total)
            .map(|index| WorkResult {
                index,
                outcome: Outcome::Pending,
            })
            .collect();
        let mut completed = 0;
        let mut first_failure = None;

        if total > 0 && !self.cancel.is_cancelled() {
            let workers = self.workers.min(total);
            tracing::debug!(pool = self.name, total, workers, "starting work pool");

            let (job_tx, job_rx) = bounded(total);
            for (index, payload) in payloads.into_iter().enumerate() {
                if job_tx.send(WorkItem { index, payload }).is_err() {
                    break;
                }
            }
            drop(job_tx);

            let (done_tx, done_rx) = unbounded();
            let abort = CancelToken::new();

            thread::scope(|scope| {
                for _ in 0..workers {
                    let job_rx = job_rx.clone();
                    let done_tx = done_tx.clone();
                    let abort = &abort;
                    scope.spawn(move || self.work(job_rx, done_tx, process, abort));
                }
                drop(done_tx);

                for (index, result) in done_rx.iter() {
                    completed += 1;
                    let failed = result.is_err();
                    results[index].outcome = match result {
                        Ok(value) => Outcome::Done(value),
                        Err(error) => {
                            tracing::debug!(pool = self.name, index, %error, "work item failed");
                            Outcome::Failed(error)
                        }
                    };
                    if failed && first_failure.is_none() {
                        first_failure = Some(index);
                        if fail_fast {
                            abort.cancel();
                        }
                    }
                    if let Some(progress) = &self.progress {
                        progress
                            .send(ProgressEvent {
                                stage: self.name,
                                index,
                                completed,
                                total,
                                failed,
                            })
                            .ok();
                    }
                }
            });
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            tracing::warn!(pool = self.name, completed, total, "work pool cancelled");
        } else {
            tracing::debug!(pool = self.name, completed, total, "work pool finished");
        }

        PoolReport {
            results,
            completed,
            cancelled,
            first_failure,
        }
    }

    /// Worker loop: dequeue until the queue drains or the run is stopped.
    fn work<T, R, F>(
        &self,
        jobs: Receiver<WorkItem<T>>,
        done: Sender<(usize, Result<R>)>,
        process: &F,
        abort: &CancelToken,
    ) where
        F: Fn(WorkItem<T>) -> Result<R>,
    {
        let stopped = || self.cancel.is_cancelled() || abort.is_cancelled();

        loop {
            if stopped() {
                break;
            }
            // The queue is filled before workers start, so empty means drained.
            let Ok(item) = jobs.try_recv() else {
                break;
            };
            let index = item.index;

            let permit = match &self.gate {
                Some(gate) => match gate.acquire_unless_cancelled(&[&self.cancel, abort]) {
                    Some(permit) => Some(permit),
                    None => break,
                },
                None => None,
            };
            if stopped() {
                break;
            }

            let result = process(item);
            drop(permit);

            if done.send((index, result)).is_err() {
                break;
            }
        }
    }
}

/// Handle to a pool running in the background.
pub struct PoolHandle<R> {
    join: JoinHandle<PoolReport<R>>,
    cancel: CancelToken,
}

impl<R> PoolHandle<R> {
    /// Stop workers from taking new items. Running items finish normally.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until every worker has exited and all results are filed.
    pub fn wait(self) -> Result<PoolReport<R>> {
        self.join
            .join()
            .map_err(|_| DubError::Other("work pool worker panicked".to_string()))
    }
}
