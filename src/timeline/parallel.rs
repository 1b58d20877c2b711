//! Parallel timeline preparation.
//!
//! Gap silences and per-cue normalization do not depend on each other, so
//! they are rendered up front through a `WorkPool` gated by the heavy-CPU
//! gate. The ordered walk afterwards only looks rendered segments up by cue
//! position.

use crate::audio::toolkit::AudioToolkit;
use crate::error::{DubError, Result};
use crate::exec::{CancelToken, GateSet, ProgressSender, ResourceGate, WorkPool};
use crate::timeline::assembler::{
    AssembledTimeline, AssemblyStats, PreparedCue, TimelineAssembler, validate_cues,
};
use crate::timeline::normalize::{NormalizedClip, Normalizer, TimelineRules};
use crate::timeline::segment::TimelineSegment;
use crate::timeline::workspace::JobWorkspace;
use crate::transcript::types::Cue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One independent piece of rendering work.
#[derive(Debug, Clone, PartialEq)]
enum Unit {
    Gap {
        position: usize,
        duration: Duration,
    },
    Silence {
        position: usize,
        duration: Duration,
    },
    Speech {
        position: usize,
        clip: PathBuf,
        window: Duration,
    },
}

impl Unit {
    fn position(&self) -> usize {
        match self {
            Unit::Gap { position, .. }
            | Unit::Silence { position, .. }
            | Unit::Speech { position, .. } => *position,
        }
    }
}

enum Rendered {
    Gap(TimelineSegment),
    Body(Vec<TimelineSegment>, Option<NormalizedClip>),
}

/// Renders a timeline's segments concurrently, then walks them in order.
pub struct ParallelTimeline {
    toolkit: Arc<dyn AudioToolkit>,
    rules: TimelineRules,
    gate: Arc<ResourceGate>,
    workers: usize,
    cancel: CancelToken,
    progress: Option<ProgressSender>,
}

impl ParallelTimeline {
    pub fn new(toolkit: Arc<dyn AudioToolkit>, rules: TimelineRules, gates: &GateSet) -> Self {
        Self {
            toolkit,
            rules,
            gate: gates.heavy_cpu.clone(),
            workers: crate::defaults::WORKERS,
            cancel: CancelToken::new(),
            progress: None,
        }
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

    /// Render, walk and concatenate in one go.
    pub fn assemble(
        &self,
        cues: &[Cue],
        clips: &[Option<PathBuf>],
        workspace: Arc<JobWorkspace>,
        out: &Path,
    ) -> Result<AssembledTimeline> {
        let (prepared, stats) = self.prepare(cues, clips, &workspace)?;

        let mut assembler = TimelineAssembler::new(self.toolkit.clone(), self.rules, workspace);
        assembler.merge_stats(stats);
        assembler.assemble_prepared(cues, prepared)?;
        assembler.concatenate(out)
    }

    /// Render every gap and cue body concurrently.
    ///
    /// Fails fast: the first unit error is returned, tagged with the cue
    /// position it belongs to.
    pub fn prepare(
        &self,
        cues: &[Cue],
        clips: &[Option<PathBuf>],
        workspace: &JobWorkspace,
    ) -> Result<(HashMap<usize, PreparedCue>, AssemblyStats)> {
        let units = plan_units(cues, clips, self.rules.min_gap)?;
        let positions: Vec<usize> = units.iter().map(Unit::position).collect();
        tracing::debug!(cues = cues.len(), units = units.len(), "rendering timeline");

        let mut pool = WorkPool::new(self.workers)
            .named("timeline")
            .with_cancel(self.cancel.clone())
            .with_gate(self.gate.clone());
        if let Some(progress) = &self.progress {
            pool = pool.with_progress(progress.clone());
        }

        let normalizer = Normalizer::new(self.toolkit.clone(), self.rules);
        let rendered = pool
            .run(units, |item| self.render(&normalizer, workspace, item.payload))
            .map_err(|error| match error {
                DubError::WorkItem { index, source } => {
                    DubError::at_item(positions.get(index).copied().unwrap_or(index), *source)
                }
                other => other,
            })?;

        let mut prepared: HashMap<usize, PreparedCue> = HashMap::with_capacity(cues.len());
        let mut stats = AssemblyStats::default();
        for (position, output) in positions.into_iter().zip(rendered) {
            let entry = prepared.entry(position).or_default();
            match output {
                Rendered::Gap(segment) => entry.gap = Some(segment),
                Rendered::Body(segments, clip) => {
                    if let Some(clip) = &clip {
                        stats.record(clip);
                    }
                    entry.body = segments;
                }
            }
        }
        Ok((prepared, stats))
    }

    fn render(
        &self,
        normalizer: &Normalizer,
        workspace: &JobWorkspace,
        unit: Unit,
    ) -> Result<Rendered> {
        match unit {
            Unit::Gap { position, duration } => {
                let path = workspace.file("gap", position);
                self.toolkit.write_silence(duration, &path)?;
                Ok(Rendered::Gap(TimelineSegment::silence(path, duration)))
            }
            Unit::Silence { position, duration } => {
                let path = workspace.file("silence", position);
                self.toolkit.write_silence(duration, &path)?;
                Ok(Rendered::Body(
                    vec![TimelineSegment::silence(path, duration)],
                    None,
                ))
            }
            Unit::Speech {
                position,
                clip,
                window,
            } => {
                let normalized = normalizer.normalize(position, &clip, window, workspace.path())?;
                let mut segments = vec![TimelineSegment::clip(
                    normalized.path.clone(),
                    normalized.duration,
                )];

                let shortfall = window.saturating_sub(normalized.duration);
                if shortfall > self.rules.padding_tolerance {
                    let path = workspace.file("pad", position);
                    self.toolkit.write_silence(shortfall, &path)?;
                    segments.push(TimelineSegment::silence(path, shortfall));
                }
                Ok(Rendered::Body(segments, Some(normalized)))
            }
        }
    }
}

/// Lay out the work for `cues` with the same cursor rules as the sequential
/// walk.
fn plan_units(cues: &[Cue], clips: &[Option<PathBuf>], min_gap: Duration) -> Result<Vec<Unit>> {
    validate_cues(cues)?;

    let mut units = Vec::with_capacity(cues.len() * 2);
    let mut last_end = Duration::ZERO;
    for (position, cue) in cues.iter().enumerate() {
        if cue.start > last_end {
            let gap = cue.start - last_end;
            if gap > min_gap {
                units.push(Unit::Gap {
                    position,
                    duration: gap,
                });
            }
        }

        let window = cue.duration();
        if cue.is_silent() {
            if !window.is_zero() {
                units.push(Unit::Silence {
                    position,
                    duration: window,
                });
            }
        } else {
            let clip = clips
                .get(position)
                .cloned()
                .flatten()
                .ok_or(DubError::MissingClip { index: position })?;
            units.push(Unit::Speech {
                position,
                clip,
                window,
            });
        }

        last_end = cue.end;
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::PcmFormat;
    use crate::audio::toolkit::WavToolkit;
    use crate::audio::wav;
    use crate::exec::progress_channel;
    use tempfile::TempDir;

    const FORMAT: PcmFormat = PcmFormat {
        sample_rate: 8_000,
        channels: 1,
    };

    fn rules() -> TimelineRules {
        TimelineRules {
            format: FORMAT,
            ..TimelineRules::default()
        }
    }

    fn clip(dir: &TempDir, name: &str, seconds: f64) -> PathBuf {
        let path = dir.path().join(name);
        let samples: Vec<i16> = (0..(seconds * 8_000.0).round() as usize)
            .map(|i| ((i as f32 * 0.2).sin() * 6_000.0) as i16)
            .collect();
        wav::write_samples(&path, &samples, FORMAT).unwrap();
        path
    }

    fn scenario(dir: &TempDir) -> (Vec<Cue>, Vec<Option<PathBuf>>) {
        let cues = vec![
            Cue::from_secs(0, 0.0, 2.0, "Hello"),
            Cue::from_secs(1, 2.0, 2.1, ""),
            Cue::from_secs(2, 5.0, 7.0, "World"),
            Cue::from_secs(3, 7.5, 9.5, "again"),
        ];
        let clips = vec![
            Some(clip(dir, "hello.wav", 1.5)),
            None,
            Some(clip(dir, "world.wav", 3.0)),
            Some(clip(dir, "again.wav", 2.2)),
        ];
        (cues, clips)
    }

    #[test]
    fn test_plan_units_matches_cursor_rules() {
        let cues = vec![
            Cue::from_secs(0, 0.005, 1.0, "a"),
            Cue::from_secs(1, 1.0, 1.0, ""),
            Cue::from_secs(2, 3.0, 4.0, ""),
        ];
        let clips = vec![Some(PathBuf::from("a.wav")), None, None];
        let units = plan_units(&cues, &clips, Duration::from_millis(10)).unwrap();

        // 5ms leading gap skipped, zero-length silent cue skipped.
        assert_eq!(units.len(), 3);
        assert!(matches!(units[0], Unit::Speech { position: 0, .. }));
        assert_eq!(
            units[1],
            Unit::Gap {
                position: 2,
                duration: Duration::from_secs(2),
            }
        );
        assert!(matches!(units[2], Unit::Silence { position: 2, .. }));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let (cues, clips) = scenario(&dir);
        let toolkit: Arc<dyn AudioToolkit> = Arc::new(WavToolkit::new(FORMAT));

        let mut sequential =
            TimelineAssembler::new(toolkit.clone(), rules(), Arc::new(JobWorkspace::new().unwrap()));
        sequential.assemble(&cues, &clips).unwrap();

        let workspace = Arc::new(JobWorkspace::new().unwrap());
        let parallel = ParallelTimeline::new(toolkit.clone(), rules(), &GateSet::new(2, 1, 1))
            .with_workers(4);
        let (prepared, stats) = parallel.prepare(&cues, &clips, &workspace).unwrap();
        let mut walked = TimelineAssembler::new(toolkit, rules(), workspace);
        walked.merge_stats(stats);
        walked.assemble_prepared(&cues, prepared).unwrap();

        let seq: Vec<(bool, Duration)> = sequential
            .segments()
            .iter()
            .map(|s| (s.is_silence(), s.duration()))
            .collect();
        let par: Vec<(bool, Duration)> = walked
            .segments()
            .iter()
            .map(|s| (s.is_silence(), s.duration()))
            .collect();
        assert_eq!(seq, par);
        assert_eq!(sequential.stats(), walked.stats());
    }

    #[test]
    fn test_parallel_assemble_writes_output() {
        let dir = TempDir::new().unwrap();
        let (cues, clips) = scenario(&dir);
        let (tx, rx) = progress_channel();
        let parallel = ParallelTimeline::new(
            Arc::new(WavToolkit::new(FORMAT)),
            rules(),
            &GateSet::new(1, 1, 1),
        )
        .with_progress(tx);

        let out = dir.path().join("dub.wav");
        let report = parallel
            .assemble(&cues, &clips, Arc::new(JobWorkspace::new().unwrap()), &out)
            .unwrap();

        assert!((report.duration.as_secs_f64() - 9.5).abs() <= 0.05);
        assert_eq!(report.adjusted, 2);
        assert_eq!(report.trimmed, 1);
        assert!(rx.try_iter().count() > 0);
    }

    #[test]
    fn test_missing_clip_reported_by_position() {
        let cues = vec![
            Cue::from_secs(0, 0.0, 1.0, ""),
            Cue::from_secs(1, 1.0, 2.0, "speech"),
        ];
        let parallel = ParallelTimeline::new(
            Arc::new(WavToolkit::new(FORMAT)),
            rules(),
            &GateSet::new(1, 1, 1),
        );
        let workspace = JobWorkspace::new().unwrap();
        assert!(matches!(
            parallel.prepare(&cues, &[None, None], &workspace),
            Err(DubError::MissingClip { index: 1 })
        ));
    }

    #[test]
    fn test_unit_failure_tagged_with_cue_position() {
        let dir = TempDir::new().unwrap();
        let cues = vec![
            Cue::from_secs(0, 0.0, 1.0, ""),
            Cue::from_secs(1, 3.0, 4.0, "broken"),
        ];
        let clips = vec![None, Some(dir.path().join("does-not-exist.wav"))];
        let parallel = ParallelTimeline::new(
            Arc::new(WavToolkit::new(FORMAT)),
            rules(),
            &GateSet::new(1, 1, 1),
        )
        .with_workers(1);
        let workspace = JobWorkspace::new().unwrap();

        let err = parallel.prepare(&cues, &clips, &workspace).unwrap_err();
        assert_eq!(err.index(), Some(1));
    }
}
