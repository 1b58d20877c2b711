use crate::audio::format::PcmFormat;
use crate::audio::tempo;
use crate::defaults;
use crate::error::{DubError, Result};
use crate::transcript::types::{checked_secs, secs_to_duration};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub gates: GateConfig,
    pub chunking: ChunkingConfig,
    pub stitcher: StitcherConfig,
    pub timeline: TimelineConfig,
    pub tools: ToolsConfig,
    pub synthesis: SynthesisConfig,
}

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
}

/// Process-wide resource gate capacities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    pub heavy_cpu: usize,
    pub transcription: usize,
    pub synthesis: usize,
}

/// Transcription chunk windows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub step_secs: f64,
    pub overlap_secs: f64,
}

/// Chunk merge behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StitcherConfig {
    pub duplicate_overlap_ratio: f64,
}

/// Timeline reconstruction thresholds and segment format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub min_gap_ms: u64,
    pub min_window_ms: u64,
    pub padding_tolerance_ms: u64,
    pub max_speedup: f64,
    pub adjustment_retries: u32,
    pub on_adjustment_failure: AdjustmentFallback,
}

/// What to do when a clip's tempo adjustment keeps failing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentFallback {
    /// Use the unadjusted clip and keep going.
    #[default]
    UseOriginal,
    /// Fail the stage.
    Abort,
}

/// Which audio toolkit renders timeline segments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub backend: ToolBackend,
    pub ffmpeg: String,
    pub ffprobe: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolBackend {
    #[default]
    Native,
    Ffmpeg,
}

impl std::str::FromStr for ToolBackend {
    type Err = DubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(ToolBackend::Native),
            "ffmpeg" => Ok(ToolBackend::Ffmpeg),
            other => Err(DubError::ConfigInvalidValue {
                key: "tools.backend".to_string(),
                message: format!("unknown backend '{}', expected native or ffmpeg", other),
            }),
        }
    }
}

/// External TTS command
///
/// `command` is a program followed by its arguments. `{text}` and `{out}` are
/// replaced by the cue text and the clip path to write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SynthesisConfig {
    pub command: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            heavy_cpu: defaults::heavy_cpu_slots(),
            transcription: defaults::TRANSCRIPTION_SLOTS,
            synthesis: defaults::SYNTHESIS_SLOTS,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            step_secs: defaults::CHUNK_STEP_SECS,
            overlap_secs: defaults::CHUNK_OVERLAP_SECS,
        }
    }
}

impl ChunkingConfig {
    pub fn step(&self) -> Duration {
        secs_to_duration(self.step_secs)
    }

    pub fn overlap(&self) -> Duration {
        secs_to_duration(self.overlap_secs)
    }
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            duplicate_overlap_ratio: defaults::DUPLICATE_OVERLAP_RATIO,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            min_gap_ms: defaults::MIN_GAP_MS,
            min_window_ms: defaults::MIN_WINDOW_MS,
            padding_tolerance_ms: defaults::PADDING_TOLERANCE_MS,
            max_speedup: defaults::MAX_SPEEDUP,
            adjustment_retries: 0,
            on_adjustment_failure: AdjustmentFallback::default(),
        }
    }
}

impl TimelineConfig {
    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend: ToolBackend::Native,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl SynthesisConfig {
    pub fn is_configured(&self) -> bool {
        !self.command.is_empty()
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML or out-of-range
    /// values. Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DUBWEAVE_WORKERS → pool.workers
    /// - DUBWEAVE_HEAVY_CPU_SLOTS → gates.heavy_cpu
    /// - DUBWEAVE_TOOLS → tools.backend
    ///
    /// Empty or unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(workers) = env_parse::<usize>("DUBWEAVE_WORKERS") {
            self.pool.workers = workers;
        }

        if let Some(slots) = env_parse::<usize>("DUBWEAVE_HEAVY_CPU_SLOTS") {
            self.gates.heavy_cpu = slots;
        }

        if let Some(backend) = env_parse::<ToolBackend>("DUBWEAVE_TOOLS") {
            self.tools.backend = backend;
        }

        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: impl Into<String>) -> DubError {
            DubError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.into(),
            }
        }

        if self.pool.workers == 0 {
            return Err(invalid("pool.workers", "must be at least 1"));
        }
        for (key, value) in [
            ("gates.heavy_cpu", self.gates.heavy_cpu),
            ("gates.transcription", self.gates.transcription),
            ("gates.synthesis", self.gates.synthesis),
        ] {
            if value == 0 {
                return Err(invalid(key, "gate capacity must be at least 1"));
            }
        }

        if !(self.chunking.step_secs.is_finite() && self.chunking.step_secs > 0.0) {
            return Err(invalid("chunking.step_secs", "must be a positive number"));
        }
        if !(self.chunking.overlap_secs.is_finite() && self.chunking.overlap_secs >= 0.0) {
            return Err(invalid("chunking.overlap_secs", "must not be negative"));
        }
        for (key, value) in [
            ("chunking.step_secs", self.chunking.step_secs),
            ("chunking.overlap_secs", self.chunking.overlap_secs),
        ] {
            checked_secs(value).map_err(|message| invalid(key, message))?;
        }

        let ratio = self.stitcher.duplicate_overlap_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(invalid(
                "stitcher.duplicate_overlap_ratio",
                format!("{} is outside (0, 1]", ratio),
            ));
        }

        let timeline = &self.timeline;
        if timeline.sample_rate == 0 {
            return Err(invalid("timeline.sample_rate", "must be positive"));
        }
        if timeline.channels == 0 {
            return Err(invalid("timeline.channels", "must be at least 1"));
        }
        if timeline.max_speedup < 1.0 || !tempo::in_primitive_range(timeline.max_speedup) {
            return Err(invalid(
                "timeline.max_speedup",
                format!(
                    "{} must be between 1.0 and {}",
                    timeline.max_speedup,
                    defaults::TEMPO_MAX
                ),
            ));
        }

        if self.synthesis.is_configured()
            && !self.synthesis.command.iter().any(|arg| arg.contains("{out}"))
        {
            return Err(invalid(
                "synthesis.command",
                "must contain an {out} placeholder for the clip path",
            ));
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/dubweave/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dubweave").join("config.toml"))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparseable environment override");
            None
        }
    }
}
