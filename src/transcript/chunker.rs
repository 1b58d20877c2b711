//! Chunk-window planning for parallel transcription.
//!
//! Source audio is cut into windows that start every `step`. Every window but
//! the last runs `overlap` past the next window's start so a word spoken
//! across a boundary is complete in at least one chunk. The stitcher removes
//! the resulting duplicates.

use crate::config::ChunkingConfig;
use crate::error::{DubError, Result};
use crate::transcript::types::ChunkWindow;
use std::time::Duration;

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPlan {
    /// Distance between consecutive window starts.
    pub step: Duration,
    /// Extra audio appended to every non-final window.
    pub overlap: Duration,
}

impl ChunkPlan {
    pub fn new(step: Duration, overlap: Duration) -> Self {
        Self { step, overlap }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            step: config.step(),
            overlap: config.overlap(),
        }
    }

    /// Split `total` into windows.
    ///
    /// The first window that reaches `total` is the final one; it is not
    /// extended and has `has_overlap == false`.
    pub fn windows(&self, total: Duration) -> Result<Vec<ChunkWindow>> {
        if self.step.is_zero() {
            return Err(DubError::ConfigInvalidValue {
                key: "chunking.step_secs".to_string(),
                message: "chunk step must be positive".to_string(),
            });
        }

        let mut windows = Vec::new();
        let mut start = Duration::ZERO;
        loop {
            let index = windows.len();
            let span = self.step.saturating_add(self.overlap);
            let extended_end = start.saturating_add(span);
            if extended_end >= total {
                windows.push(ChunkWindow {
                    index,
                    start,
                    duration: total.saturating_sub(start),
                    has_overlap: false,
                });
                break;
            }
            windows.push(ChunkWindow {
                index,
                start,
                duration: span,
                has_overlap: true,
            });
            start += self.step;
        }
        Ok(windows)
    }
}

impl Default for ChunkPlan {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}
