use crate::audio::format::PcmFormat;
use crate::audio::wav;
use crate::error::{DubError, Result};
use crate::synth::Synthesizer;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock synthesizer for testing.
///
/// Writes a 220Hz tone for every request. Clip length is fixed per text, with
/// a default for texts that were not configured.
#[derive(Debug)]
pub struct MockSynthesizer {
    format: PcmFormat,
    default_duration: Duration,
    durations: HashMap<String, Duration>,
    failing: HashSet<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            format: PcmFormat::default(),
            default_duration: Duration::from_secs(1),
            durations: HashMap::new(),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Layout of written clips.
    pub fn with_format(mut self, format: PcmFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Clip length for a specific text.
    pub fn with_clip(mut self, text: &str, duration: Duration) -> Self {
        self.durations.insert(text.to_string(), duration);
        self
    }

    /// Fail when asked to speak this text.
    pub fn with_failure(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    /// Sleep this long before writing each clip.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str, out: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.failing.contains(text) {
            return Err(DubError::ToolFailed {
                tool: "mock-tts".to_string(),
                message: format!("mock synthesis failure for {:?}", text),
            });
        }

        let duration = self
            .durations
            .get(text)
            .copied()
            .unwrap_or(self.default_duration);
        let frames = self.format.frames_for(duration);
        let channels = self.format.channels.max(1) as usize;
        let rate = self.format.sample_rate as f32;
        let samples: Vec<i16> = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / rate;
                let s = ((2.0 * std::f32::consts::PI * 220.0 * t).sin() * 8_000.0) as i16;
                std::iter::repeat_n(s, channels)
            })
            .collect();

        wav::write_samples(out, &samples, self.format)?;
        Ok(out.to_path_buf())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_clip_of_configured_length() {
        let dir = TempDir::new().unwrap();
        let synth = MockSynthesizer::new()
            .with_format(PcmFormat::new(16_000, 2))
            .with_clip("Hello", Duration::from_millis(1500));

        let path = synth.synthesize("Hello", &dir.path().join("a.wav")).unwrap();
        assert_eq!(wav::wav_duration(&path).unwrap(), Duration::from_millis(1500));

        let clip = wav::read_clip(&path).unwrap();
        assert_eq!((clip.sample_rate, clip.channels), (16_000, 2));

        let other = synth.synthesize("other", &dir.path().join("b.wav")).unwrap();
        assert_eq!(wav::wav_duration(&other).unwrap(), Duration::from_secs(1));
        assert_eq!(synth.call_count(), 2);
    }

    #[test]
    fn test_configured_failure() {
        let dir = TempDir::new().unwrap();
        let synth = MockSynthesizer::new().with_failure("bad");
        assert!(synth.synthesize("bad", &dir.path().join("x.wav")).is_err());
        assert!(!dir.path().join("x.wav").exists());
    }
}
