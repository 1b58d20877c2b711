//! Sequential timeline reconstruction.
//!
//! Walks cues in order, emitting gap silence, speech and padding segments so
//! that every cue starts on schedule, then concatenates the segments into one
//! file.

use crate::audio::toolkit::AudioToolkit;
use crate::error::{DubError, Result};
use crate::timeline::normalize::{NormalizedClip, Normalizer, TimelineRules};
use crate::timeline::segment::{TimelineSegment, total_duration};
use crate::timeline::workspace::JobWorkspace;
use crate::transcript::types::{Cue, secs};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Adjustment counters for one assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    /// Clips sped up to fit their window.
    pub adjusted: usize,
    /// Clips cut off at the end of their window.
    pub trimmed: usize,
    /// Clips used unadjusted after a failed adjustment.
    pub fallbacks: usize,
}

impl AssemblyStats {
    pub fn record(&mut self, clip: &NormalizedClip) {
        if clip.was_adjusted() {
            self.adjusted += 1;
        }
        if clip.was_trimmed() {
            self.trimmed += 1;
        }
        if clip.fell_back {
            self.fallbacks += 1;
        }
    }
}

/// The finished audio file and how it was built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledTimeline {
    pub path: PathBuf,
    #[serde(with = "secs")]
    pub duration: Duration,
    pub segments: usize,
    pub adjusted: usize,
    pub trimmed: usize,
    pub fallbacks: usize,
}

/// Segments pre-rendered for one cue position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedCue {
    /// Silence before the cue, if the gap was long enough.
    pub gap: Option<TimelineSegment>,
    /// Speech plus padding, or the silence of an empty cue.
    pub body: Vec<TimelineSegment>,
}

/// Check that cues are non-empty, ascending by start and never end before
/// they start.
pub fn validate_cues(cues: &[Cue]) -> Result<()> {
    if cues.is_empty() {
        return Err(DubError::EmptyCueList);
    }
    if let Some(index) = cues.iter().position(|cue| cue.end < cue.start) {
        return Err(DubError::InvertedCue { index });
    }
    if let Some(index) = cues
        .windows(2)
        .position(|pair| pair[1].start < pair[0].start)
    {
        return Err(DubError::UnsortedCues { index: index + 1 });
    }
    Ok(())
}

/// Per-job timeline state: the `last_end` cursor and ordered segments.
pub struct TimelineAssembler {
    toolkit: Arc<dyn AudioToolkit>,
    normalizer: Normalizer,
    workspace: Arc<JobWorkspace>,
    last_end: Duration,
    segments: Vec<TimelineSegment>,
    stats: AssemblyStats,
}

impl TimelineAssembler {
    pub fn new(
        toolkit: Arc<dyn AudioToolkit>,
        rules: TimelineRules,
        workspace: Arc<JobWorkspace>,
    ) -> Self {
        Self {
            normalizer: Normalizer::new(toolkit.clone(), rules),
            toolkit,
            workspace,
            last_end: Duration::ZERO,
            segments: Vec::new(),
            stats: AssemblyStats::default(),
        }
    }

    pub fn rules(&self) -> &TimelineRules {
        self.normalizer.rules()
    }

    pub fn last_end(&self) -> Duration {
        self.last_end
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn stats(&self) -> AssemblyStats {
        self.stats
    }

    /// Sum of all segment durations so far.
    pub fn duration(&self) -> Duration {
        total_duration(&self.segments)
    }

    /// Append silence for a gap between cues, unless it is inaudibly short.
    ///
    /// Returns whether a segment was added.
    pub fn add_gap_silence(&mut self, gap: Duration) -> Result<bool> {
        if gap <= self.rules().min_gap {
            return Ok(false);
        }
        self.add_silence(gap)?;
        Ok(true)
    }

    /// Append a silence segment of exactly `duration`.
    pub fn add_silence(&mut self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return Ok(());
        }
        let path = self.workspace.unique("silence");
        self.toolkit.write_silence(duration, &path)?;
        tracing::debug!(secs = duration.as_secs_f64(), "silence segment");
        self.segments.push(TimelineSegment::silence(path, duration));
        Ok(())
    }

    /// Normalize `clip` toward `window` and append it.
    ///
    /// Returns the duration of the appended clip.
    pub fn add_speech_segment(
        &mut self,
        index: usize,
        clip: &Path,
        window: Duration,
    ) -> Result<Duration> {
        let normalized = self
            .normalizer
            .normalize(index, clip, window, self.workspace.path())?;
        self.stats.record(&normalized);
        let duration = normalized.duration;
        tracing::debug!(index, secs = duration.as_secs_f64(), "speech segment");
        self.segments
            .push(TimelineSegment::clip(normalized.path, duration));
        Ok(duration)
    }

    /// Pad a clip that undershoots its window so the next cue starts on time.
    ///
    /// Returns whether a segment was added.
    pub fn add_padding(&mut self, clip: Duration, window: Duration) -> Result<bool> {
        let shortfall = window.saturating_sub(clip);
        if shortfall <= self.rules().padding_tolerance {
            return Ok(false);
        }
        self.add_silence(shortfall)?;
        Ok(true)
    }

    /// Append an already rendered segment.
    pub fn push_segment(&mut self, segment: TimelineSegment) {
        self.segments.push(segment);
    }

    /// Fold adjustment counters from segments rendered elsewhere.
    pub fn merge_stats(&mut self, stats: AssemblyStats) {
        self.stats.adjusted += stats.adjusted;
        self.stats.trimmed += stats.trimmed;
        self.stats.fallbacks += stats.fallbacks;
    }

    /// Render the timeline for `cues`, one cue at a time.
    ///
    /// `clips[i]` is the synthesized clip for `cues[i]`; silent cues need none.
    pub fn assemble(&mut self, cues: &[Cue], clips: &[Option<PathBuf>]) -> Result<()> {
        validate_cues(cues)?;

        for (position, cue) in cues.iter().enumerate() {
            if cue.start > self.last_end {
                self.add_gap_silence(cue.start - self.last_end)?;
            }

            let window = cue.duration();
            if cue.is_silent() {
                self.add_silence(window)?;
            } else {
                let clip = clips
                    .get(position)
                    .and_then(Option::as_deref)
                    .ok_or(DubError::MissingClip { index: position })?;
                let duration = self.add_speech_segment(position, clip, window)?;
                self.add_padding(duration, window)?;
            }

            self.last_end = cue.end;
        }
        Ok(())
    }

    /// Walk `cues` using segments rendered ahead of time, keyed by cue
    /// position.
    pub fn assemble_prepared(
        &mut self,
        cues: &[Cue],
        mut prepared: HashMap<usize, PreparedCue>,
    ) -> Result<()> {
        validate_cues(cues)?;

        for (position, cue) in cues.iter().enumerate() {
            let PreparedCue { gap, body } = prepared.remove(&position).unwrap_or_default();
            if cue.start > self.last_end
                && let Some(gap) = gap
            {
                self.push_segment(gap);
            }
            if body.is_empty() && !cue.is_silent() {
                return Err(DubError::MissingClip { index: position });
            }
            self.segments.extend(body);
            self.last_end = cue.end;
        }
        Ok(())
    }

    /// Join all segments in insertion order into `out`.
    pub fn concatenate(&self, out: &Path) -> Result<AssembledTimeline> {
        if self.segments.is_empty() {
            return Err(DubError::NoSegments);
        }

        let manifest: Vec<PathBuf> = self
            .segments
            .iter()
            .map(|segment| segment.path().to_path_buf())
            .collect();
        let duration = self.toolkit.concatenate(&manifest, out)?;

        tracing::info!(
            segments = manifest.len(),
            secs = duration.as_secs_f64(),
            expected = self.last_end.as_secs_f64(),
            output = %out.display(),
            "timeline assembled"
        );

        Ok(AssembledTimeline {
            path: out.to_path_buf(),
            duration,
            segments: manifest.len(),
            adjusted: self.stats.adjusted,
            trimmed: self.stats.trimmed,
            fallbacks: self.stats.fallbacks,
        })
    }
}
