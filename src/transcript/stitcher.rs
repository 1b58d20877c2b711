//! Stitcher for combining cues from overlapping chunk transcriptions.
//!
//! Chunks are transcribed independently and arrive in any order. The stitcher
//! moves every cue onto the global timeline, orders the result by start time
//! and drops the copies produced by the overlap between adjacent windows.

use crate::config::StitcherConfig;
use crate::error::{DubError, Result};
use crate::transcript::types::{Chunk, Cue};
use std::time::Duration;

/// Merges chunk cues into one ordered, deduplicated sequence.
#[derive(Debug, Clone)]
pub struct ChunkStitcher {
    config: StitcherConfig,
}

impl ChunkStitcher {
    /// Creates a stitcher with the default duplicate threshold.
    pub fn new() -> Self {
        Self::with_config(StitcherConfig::default())
    }

    pub fn with_config(config: StitcherConfig) -> Self {
        Self { config }
    }

    pub fn duplicate_overlap_ratio(&self) -> f64 {
        self.config.duplicate_overlap_ratio
    }

    /// Merge successfully transcribed chunks.
    ///
    /// A single chunk is returned untouched. With several chunks, cue indices
    /// are renumbered to match their position in the merged sequence.
    pub fn stitch(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Cue>> {
        if chunks.is_empty() {
            return Err(DubError::NoChunks);
        }
        if chunks.len() == 1 {
            return Ok(chunks.remove(0).cues);
        }

        // Upstream completion order must not influence tie-breaking.
        chunks.sort_by_key(|chunk| chunk.index);

        let mut cues: Vec<Cue> = chunks
            .into_iter()
            .flat_map(|chunk| {
                let offset = chunk.window_start;
                chunk.cues.into_iter().map(move |cue| cue.offset_by(offset))
            })
            .collect();
        cues.sort_by_key(|cue| cue.start);

        let mut merged: Vec<Cue> = Vec::with_capacity(cues.len());
        let mut dropped = 0usize;
        for cue in cues {
            if let Some(last_kept) = merged.last()
                && self.is_duplicate(last_kept, &cue)
            {
                dropped += 1;
                continue;
            }
            merged.push(cue);
        }

        for (index, cue) in merged.iter_mut().enumerate() {
            cue.index = index;
        }

        tracing::debug!(kept = merged.len(), dropped, "stitched chunk cues");
        Ok(merged)
    }

    /// Merge chunk transcription results, failing if any chunk failed.
    ///
    /// Dropping a failed chunk would silently drop its audio, so the whole
    /// merge is rejected with the failed chunk's index.
    pub fn stitch_results(&self, results: Vec<(usize, Result<Chunk>)>) -> Result<Vec<Cue>> {
        let mut chunks = Vec::with_capacity(results.len());
        for (index, result) in results {
            match result {
                Ok(chunk) => chunks.push(chunk),
                Err(source) => {
                    return Err(DubError::ChunkFailed {
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }
        self.stitch(chunks)
    }

    /// Whether `candidate` mostly repeats `kept`.
    ///
    /// Zero-length candidates are never duplicates.
    fn is_duplicate(&self, kept: &Cue, candidate: &Cue) -> bool {
        let candidate_duration = candidate.duration();
        if candidate_duration.is_zero() {
            return false;
        }
        let overlap = overlap(kept, candidate);
        if overlap.is_zero() {
            return false;
        }
        overlap.as_secs_f64() / candidate_duration.as_secs_f64()
            > self.config.duplicate_overlap_ratio
    }
}

impl Default for ChunkStitcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the intersection of two cue intervals.
fn overlap(a: &Cue, b: &Cue) -> Duration {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    end.saturating_sub(start)
}
