//! The dubbing stage: cues in, one time-synchronized audio file out.
//!
//! Missing clips are synthesized in parallel under the synthesis gate, the
//! timeline is rendered in parallel under the heavy-CPU gate, and the ordered
//! walk concatenates everything into the caller's output path. The job
//! workspace and all intermediate files are removed when the stage returns.

use crate::audio::toolkit::AudioToolkit;
use crate::error::{DubError, Result};
use crate::exec::{CancelToken, GateSet, ProgressSender, WorkPool};
use crate::synth::Synthesizer;
use crate::timeline::assembler::{AssembledTimeline, validate_cues};
use crate::timeline::normalize::TimelineRules;
use crate::timeline::parallel::ParallelTimeline;
use crate::timeline::workspace::JobWorkspace;
use crate::transcript::types::Cue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A cue with an optional pre-rendered clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DubCue {
    #[serde(flatten)]
    pub cue: Cue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<PathBuf>,
}

impl DubCue {
    pub fn new(cue: Cue) -> Self {
        Self { cue, clip: None }
    }

    pub fn with_clip(mut self, clip: impl Into<PathBuf>) -> Self {
        self.clip = Some(clip.into());
        self
    }
}

impl From<Cue> for DubCue {
    fn from(cue: Cue) -> Self {
        Self::new(cue)
    }
}

pub struct DubStage {
    synthesizer: Arc<dyn Synthesizer>,
    toolkit: Arc<dyn AudioToolkit>,
    gates: GateSet,
    rules: TimelineRules,
    workers: usize,
    cancel: CancelToken,
    progress: Option<ProgressSender>,
    workspace_root: Option<PathBuf>,
}

impl DubStage {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        toolkit: Arc<dyn AudioToolkit>,
        gates: GateSet,
    ) -> Self {
        let rules = TimelineRules {
            format: toolkit.format(),
            ..TimelineRules::default()
        };
        Self {
            synthesizer,
            toolkit,
            gates,
            rules,
            workers: crate::defaults::WORKERS,
            cancel: CancelToken::new(),
            progress: None,
            workspace_root: None,
        }
    }

    pub fn with_rules(mut self, rules: TimelineRules) -> Self {
        self.rules = rules;
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

    /// Create job workspaces under `dir` instead of the system temp dir.
    pub fn with_workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(dir.into());
        self
    }

    /// Dub `cues` into `out`.
    pub fn run(&self, cues: &[DubCue], out: &Path) -> Result<AssembledTimeline> {
        let timeline: Vec<Cue> = cues.iter().map(|c| c.cue.clone()).collect();
        let mut clips: Vec<Option<PathBuf>> = cues.iter().map(|c| c.clip.clone()).collect();
        validate_cues(&timeline)?;

        let workspace = Arc::new(match &self.workspace_root {
            Some(root) => JobWorkspace::in_dir(root)?,
            None => JobWorkspace::new()?,
        });

        let missing: Vec<(usize, String)> = timeline
            .iter()
            .enumerate()
            .filter(|(position, cue)| !cue.is_silent() && clips[*position].is_none())
            .map(|(position, cue)| (position, cue.text.clone()))
            .collect();
        tracing::info!(
            cues = timeline.len(),
            to_synthesize = missing.len(),
            backend = self.synthesizer.name(),
            toolkit = self.toolkit.name(),
            "dubbing"
        );

        if !missing.is_empty() {
            for (position, path) in self.synthesize(missing, &workspace)? {
                clips[position] = Some(path);
            }
        }

        let mut assembly = ParallelTimeline::new(self.toolkit.clone(), self.rules, &self.gates)
            .with_workers(self.workers)
            .with_cancel(self.cancel.clone());
        if let Some(progress) = &self.progress {
            assembly = assembly.with_progress(progress.clone());
        }
        assembly.assemble(&timeline, &clips, workspace, out)
    }

    fn synthesize(
        &self,
        requests: Vec<(usize, String)>,
        workspace: &JobWorkspace,
    ) -> Result<Vec<(usize, PathBuf)>> {
        let mut pool = WorkPool::new(self.workers)
            .named("synthesis")
            .with_cancel(self.cancel.clone())
            .with_gate(self.gates.synthesis.clone());
        if let Some(progress) = &self.progress {
            pool = pool.with_progress(progress.clone());
        }

        let synthesizer = &self.synthesizer;
        pool.run(requests, |item| {
            let (position, text) = item.payload;
            let target = workspace.file("tts", position);
            let path = synthesizer
                .synthesize(&text, &target)
                .map_err(|e| DubError::Synthesis {
                    index: position,
                    message: e.to_string(),
                })?;
            Ok((position, path))
        })
        .map_err(|error| match error {
            DubError::WorkItem { source, .. } if source.index().is_some() => *source,
            other => other,
        })
    }
}
