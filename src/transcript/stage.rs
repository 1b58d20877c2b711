//! Parallel chunked transcription.
//!
//! Plans chunk windows, transcribes them through a fail-fast pool gated by the
//! process-wide transcription gate, and stitches the results.

use crate::error::{DubError, Result};
use crate::exec::{CancelToken, GateSet, ProgressSender, WorkPool};
use crate::transcript::chunker::ChunkPlan;
use crate::transcript::stitcher::ChunkStitcher;
use crate::transcript::transcriber::ChunkTranscriber;
use crate::transcript::types::{Chunk, ChunkWindow, Cue};
use std::sync::Arc;
use std::time::Duration;

/// Transcribes long audio as overlapping chunks in parallel.
pub struct ChunkedTranscription {
    transcriber: Arc<dyn ChunkTranscriber>,
    gates: GateSet,
    plan: ChunkPlan,
    stitcher: ChunkStitcher,
    workers: usize,
    cancel: CancelToken,
    progress: Option<ProgressSender>,
}

impl ChunkedTranscription {
    pub fn new(transcriber: Arc<dyn ChunkTranscriber>, gates: GateSet) -> Self {
        Self {
            transcriber,
            gates,
            plan: ChunkPlan::default(),
            stitcher: ChunkStitcher::new(),
            workers: crate::defaults::WORKERS,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_plan(mut self, plan: ChunkPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_stitcher(mut self, stitcher: ChunkStitcher) -> Self {
        self.stitcher = stitcher;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Transcribe `total` seconds of source audio.
    pub fn run(&self, total: Duration) -> Result<Vec<Cue>> {
        let windows = self.plan.windows(total)?;
        self.run_windows(windows)
    }

    /// Transcribe pre-planned windows.
    ///
    /// Any chunk failure aborts the whole run with `ChunkFailed`.
    pub fn run_windows(&self, windows: Vec<ChunkWindow>) -> Result<Vec<Cue>> {
        let total = windows.len();
        tracing::info!(
            backend = self.transcriber.name(),
            chunks = total,
            "transcribing chunks"
        );

        let mut pool = WorkPool::new(self.workers)
            .named("transcription")
            .with_cancel(self.cancel.clone())
            .with_gate(self.gates.transcription.clone());
        if let Some(progress) = &self.progress {
            pool = pool.with_progress(progress.clone());
        }

        let transcriber = &self.transcriber;
        let chunks = pool
            .run(windows, |item| {
                let cues = transcriber.transcribe_window(&item.payload)?;
                Ok(Chunk::from_window(&item.payload, cues))
            })
            .map_err(|error| match error {
                DubError::WorkItem { index, source } => DubError::ChunkFailed { index, source },
                other => other,
            })?;

        let cues = self.stitcher.stitch(chunks)?;
        tracing::info!(chunks = total, cues = cues.len(), "transcription stitched");
        Ok(cues)
    }
}
