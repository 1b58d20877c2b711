//! Cue and chunk data types.
//!
//! Times are `Duration` offsets from the start of the source audio. On the
//! wire (JSON cue and chunk files) they are plain seconds as `f64`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A time-stamped text span that needs speech, or silence when `text` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    #[serde(default)]
    pub index: usize,
    #[serde(with = "secs")]
    pub start: Duration,
    #[serde(with = "secs")]
    pub end: Duration,
    #[serde(default)]
    pub text: String,
}

impl Cue {
    pub fn new(index: usize, start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    /// Build a cue from second offsets.
    pub fn from_secs(index: usize, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self::new(
            index,
            secs_to_duration(start),
            secs_to_duration(end),
            text,
        )
    }

    /// Length of the cue window. Zero if `end` precedes `start`.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Cues with no text stand for silence.
    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Shift both bounds later by `offset`.
    pub fn offset_by(mut self, offset: Duration) -> Self {
        self.start = self.start.saturating_add(offset);
        self.end = self.end.saturating_add(offset);
        self
    }
}

/// Time window of a chunk within the source audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub index: usize,
    #[serde(with = "secs")]
    pub start: Duration,
    #[serde(with = "secs")]
    pub duration: Duration,
    /// Whether the window extends past its nominal step into the next chunk.
    pub has_overlap: bool,
}

impl ChunkWindow {
    pub fn end(&self) -> Duration {
        self.start.saturating_add(self.duration)
    }
}

/// Cues transcribed from one chunk, timed relative to the chunk start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    #[serde(with = "secs")]
    pub window_start: Duration,
    #[serde(with = "secs")]
    pub window_duration: Duration,
    #[serde(default)]
    pub has_overlap: bool,
    #[serde(default)]
    pub cues: Vec<Cue>,
}

impl Chunk {
    /// Attach transcribed cues to the window they came from.
    pub fn from_window(window: &ChunkWindow, cues: Vec<Cue>) -> Self {
        Self {
            index: window.index,
            window_start: window.start,
            window_duration: window.duration,
            has_overlap: window.has_overlap,
            cues,
        }
    }
}

/// Convert seconds to a `Duration`, clamping negative and non-finite input to
/// zero and saturating values too large to represent.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Strict conversion for untrusted offsets: negative, NaN, infinite and
/// out-of-range values are reported instead of clamped.
pub fn checked_secs(secs: f64) -> std::result::Result<Duration, String> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| format!("invalid time offset {secs}: {e}"))
}

/// Serde adapter storing a `Duration` as fractional seconds.
pub mod secs {
    use super::checked_secs;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        checked_secs(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_duration() {
        let cue = Cue::from_secs(0, 1.5, 4.0, "hello");
        assert_eq!(cue.duration(), Duration::from_millis(2500));
    }

    #[test]
    fn test_inverted_cue_has_zero_duration() {
        let cue = Cue::from_secs(0, 4.0, 1.0, "hello");
        assert_eq!(cue.duration(), Duration::ZERO);
    }

    #[test]
    fn test_whitespace_cue_is_silent() {
        assert!(Cue::from_secs(0, 0.0, 1.0, "").is_silent());
        assert!(Cue::from_secs(0, 0.0, 1.0, "  \n").is_silent());
        assert!(!Cue::from_secs(0, 0.0, 1.0, "hi").is_silent());
    }

    #[test]
    fn test_offset_by() {
        let cue = Cue::from_secs(0, 0.5, 1.0, "x").offset_by(Duration::from_secs(10));
        assert_eq!(cue.start, Duration::from_millis(10_500));
        assert_eq!(cue.end, Duration::from_secs(11));
    }

    #[test]
    fn test_cue_json_uses_seconds() {
        let cue = Cue::from_secs(3, 1.25, 2.5, "hola");
        let json = serde_json::to_string(&cue).unwrap();
        assert_eq!(json, r#"{"index":3,"start":1.25,"end":2.5,"text":"hola"}"#);

        let back: Cue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cue);
    }

    #[test]
    fn test_cue_json_defaults() {
        let cue: Cue = serde_json::from_str(r#"{"start":0.0,"end":1.0}"#).unwrap();
        assert_eq!(cue.index, 0);
        assert!(cue.text.is_empty());
    }

    #[test]
    fn test_negative_time_rejected() {
        let result = serde_json::from_str::<Cue>(r#"{"start":-1.0,"end":1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_from_window() {
        let window = ChunkWindow {
            index: 2,
            start: Duration::from_secs(20),
            duration: Duration::from_secs(12),
            has_overlap: true,
        };
        let chunk = Chunk::from_window(&window, vec![Cue::from_secs(0, 0.0, 1.0, "a")]);
        assert_eq!(chunk.index, 2);
        assert_eq!(chunk.window_start, Duration::from_secs(20));
        assert!(chunk.has_overlap);
        assert_eq!(window.end(), Duration::from_secs(32));
    }

    #[test]
    fn test_secs_to_duration_clamps() {
        assert_eq!(secs_to_duration(-3.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(0.25), Duration::from_millis(250));
        assert_eq!(secs_to_duration(1e30), Duration::MAX);
    }

    #[test]
    fn test_huge_offsets_do_not_panic() {
        let cue = Cue::from_secs(0, 1e20, 1e25, "x");
        assert_eq!(cue.start, Duration::MAX);
        assert_eq!(cue.duration(), Duration::ZERO);
        assert!(checked_secs(1e20).is_err());
        assert!(checked_secs(f64::INFINITY).is_err());
        assert_eq!(checked_secs(1.5), Ok(Duration::from_millis(1500)));
    }

    #[test]
    fn test_offset_saturates() {
        let cue = Cue::from_secs(0, 1.0, 2.0, "x").offset_by(Duration::MAX);
        assert_eq!(cue.start, Duration::MAX);
        assert_eq!(cue.end, Duration::MAX);
    }

    #[test]
    fn test_out_of_range_time_rejected() {
        let result = serde_json::from_str::<Cue>(r#"{"start":1e20,"end":1e20,"text":"x"}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid time offset"), "{err}");

        let window = serde_json::from_str::<ChunkWindow>(
            r#"{"index":0,"start":0.0,"duration":1e300,"has_overlap":false}"#,
        );
        assert!(window.is_err());
    }
}
