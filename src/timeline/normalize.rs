//! Fitting speech clips into their cue windows.
//!
//! Clips are never slowed down. A clip that overruns its window is sped up by
//! at most `max_speedup`; whatever still does not fit is cut off at the end of
//! the window.

use crate::audio::format::PcmFormat;
use crate::audio::toolkit::AudioToolkit;
use crate::config::{AdjustmentFallback, TimelineConfig};
use crate::defaults;
use crate::error::{DubError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Thresholds that shape the reconstructed timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineRules {
    pub format: PcmFormat,
    /// Gaps up to this long are not rendered.
    pub min_gap: Duration,
    /// Windows up to this long are never normalized.
    pub min_window: Duration,
    /// Undershoot allowed before padding is appended.
    pub padding_tolerance: Duration,
    pub max_speedup: f64,
    pub policy: AdjustmentPolicy,
}

impl TimelineRules {
    pub fn from_config(config: &TimelineConfig) -> Self {
        Self {
            format: config.format(),
            min_gap: Duration::from_millis(config.min_gap_ms),
            min_window: Duration::from_millis(config.min_window_ms),
            padding_tolerance: Duration::from_millis(config.padding_tolerance_ms),
            max_speedup: config.max_speedup,
            policy: AdjustmentPolicy {
                retries: config.adjustment_retries,
                on_failure: config.on_adjustment_failure,
            },
        }
    }

    pub fn with_policy(mut self, policy: AdjustmentPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for TimelineRules {
    fn default() -> Self {
        Self {
            format: PcmFormat::default(),
            min_gap: Duration::from_millis(defaults::MIN_GAP_MS),
            min_window: Duration::from_millis(defaults::MIN_WINDOW_MS),
            padding_tolerance: Duration::from_millis(defaults::PADDING_TOLERANCE_MS),
            max_speedup: defaults::MAX_SPEEDUP,
            policy: AdjustmentPolicy::default(),
        }
    }
}

/// How failed tempo adjustments are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdjustmentPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub on_failure: AdjustmentFallback,
}

/// What to do with a clip for a given window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    /// Use the clip as it is.
    Keep,
    /// Speed up by `factor`, then cut to `trim_to` if set.
    SpeedUp {
        factor: f64,
        trim_to: Option<Duration>,
    },
}

/// Decide how to fit a clip of length `clip` into `window`.
pub fn plan(clip: Duration, window: Duration, rules: &TimelineRules) -> Adjustment {
    if window <= rules.min_window || clip <= window {
        return Adjustment::Keep;
    }

    let needed = clip.as_secs_f64() / window.as_secs_f64();
    let factor = needed.min(rules.max_speedup);
    let trim_to = (factor < needed).then_some(window);
    Adjustment::SpeedUp { factor, trim_to }
}

/// A clip conformed to the segment format and fitted to its window.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedClip {
    pub path: PathBuf,
    pub duration: Duration,
    pub adjustment: Adjustment,
    /// The adjustment failed and the unadjusted clip was used instead.
    pub fell_back: bool,
}

impl NormalizedClip {
    pub fn was_adjusted(&self) -> bool {
        !self.fell_back && matches!(self.adjustment, Adjustment::SpeedUp { .. })
    }

    pub fn was_trimmed(&self) -> bool {
        !self.fell_back
            && matches!(
                self.adjustment,
                Adjustment::SpeedUp {
                    trim_to: Some(_),
                    ..
                }
            )
    }
}

/// Applies `plan` to clip files using an audio toolkit.
#[derive(Clone)]
pub struct Normalizer {
    toolkit: Arc<dyn AudioToolkit>,
    rules: TimelineRules,
}

impl Normalizer {
    pub fn new(toolkit: Arc<dyn AudioToolkit>, rules: TimelineRules) -> Self {
        Self { toolkit, rules }
    }

    pub fn rules(&self) -> &TimelineRules {
        &self.rules
    }

    /// Conform `clip` into `dir` and fit it to `window`.
    ///
    /// Conformance failures are returned as-is. Tempo failures are retried
    /// per the adjustment policy, then either fall back to the conformed clip
    /// or abort with `DubError::Adjustment`.
    pub fn normalize(
        &self,
        index: usize,
        clip: &Path,
        window: Duration,
        dir: &Path,
    ) -> Result<NormalizedClip> {
        let conformed = dir.join(format!("clip-{index:05}.wav"));
        let duration = self.toolkit.conform(clip, &conformed)?;

        let adjustment = plan(duration, window, &self.rules);
        let Adjustment::SpeedUp { factor, trim_to } = adjustment else {
            return Ok(NormalizedClip {
                path: conformed,
                duration,
                adjustment,
                fell_back: false,
            });
        };

        let attempts = self.rules.policy.retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.apply(index, &conformed, factor, trim_to, dir) {
                Ok((path, adjusted)) => {
                    tracing::debug!(
                        index,
                        factor,
                        trimmed = trim_to.is_some(),
                        from = duration.as_secs_f64(),
                        to = adjusted.as_secs_f64(),
                        "normalized clip"
                    );
                    return Ok(NormalizedClip {
                        path,
                        duration: adjusted,
                        adjustment,
                        fell_back: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(index, attempt, attempts, error = %e, "tempo adjustment failed");
                    last_error = Some(e);
                }
            }
        }

        let message = last_error.map_or_else(String::new, |e| e.to_string());
        match self.rules.policy.on_failure {
            AdjustmentFallback::UseOriginal => {
                tracing::warn!(index, "using unadjusted clip");
                Ok(NormalizedClip {
                    path: conformed,
                    duration,
                    adjustment,
                    fell_back: true,
                })
            }
            AdjustmentFallback::Abort => Err(DubError::Adjustment { index, message }),
        }
    }

    fn apply(
        &self,
        index: usize,
        conformed: &Path,
        factor: f64,
        trim_to: Option<Duration>,
        dir: &Path,
    ) -> Result<(PathBuf, Duration)> {
        let sped = dir.join(format!("tempo-{index:05}.wav"));
        self.toolkit.tempo_chained(conformed, factor, &sped)?;

        let path = match trim_to {
            Some(length) => {
                let trimmed = dir.join(format!("fit-{index:05}.wav"));
                self.toolkit.trim(&sped, length, &trimmed)?;
                trimmed
            }
            None => sped,
        };
        let duration = self.toolkit.probe_duration(&path)?;
        Ok((path, duration))
    }
}
