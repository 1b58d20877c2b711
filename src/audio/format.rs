use crate::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PCM layout shared by every intermediate timeline segment.
///
/// Segments are always 16-bit signed little-endian WAV so concatenation is a
/// plain copy with no re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of frames (samples per channel) covering `duration`, rounded.
    pub fn frames_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }

    /// Number of interleaved samples covering `duration`.
    pub fn samples_for(&self, duration: Duration) -> usize {
        self.frames_for(duration) * self.channels as usize
    }

    /// Duration of `samples` interleaved samples.
    pub fn duration_of(&self, samples: usize) -> Duration {
        let frames = samples / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Whether a WAV file with `spec` can be concatenated as-is.
    pub fn matches(&self, spec: &hound::WavSpec) -> bool {
        spec.sample_rate == self.sample_rate
            && spec.channels == self.channels
            && spec.bits_per_sample == 16
            && spec.sample_format == hound::SampleFormat::Int
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::new(defaults::SAMPLE_RATE, defaults::CHANNELS)
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz/{}ch s16", self.sample_rate, self.channels)
    }
}
