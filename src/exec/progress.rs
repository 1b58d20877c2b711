//! Progress events emitted by work pools.
//!
//! Events flow through a crossbeam channel so the caller drains them at its
//! own pace instead of running callbacks on worker threads.

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Completion notice for a single work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Name of the pool that produced the event.
    pub stage: &'static str,
    /// Index of the item that just finished. Arrives in completion order.
    pub index: usize,
    /// Number of items finished so far, including this one. Strictly increasing.
    pub completed: usize,
    /// Number of items submitted to the pool.
    pub total: usize,
    /// Whether the item failed.
    pub failed: bool,
}

impl ProgressEvent {
    /// Fraction of the pool completed, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_last(&self) -> bool {
        self.completed == self.total
    }
}

pub type ProgressSender = Sender<ProgressEvent>;
pub type ProgressReceiver = Receiver<ProgressEvent>;

/// Create an unbounded progress stream.
///
/// Workers never block on a slow consumer.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    unbounded()
}
