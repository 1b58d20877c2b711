//! Default configuration constants for dubweave.
//!
//! Shared by the configuration types and the engine.

/// Sample rate of every intermediate timeline segment, in Hz.
///
/// 24kHz matches the native output of most neural TTS voices, so conforming
/// synthesized clips rarely needs resampling.
pub const SAMPLE_RATE: u32 = 24_000;

/// Channel count of every intermediate timeline segment.
pub const CHANNELS: u16 = 1;

/// Gaps shorter than this are inaudible and are not emitted as silence.
pub const MIN_GAP_MS: u64 = 10;

/// Cue windows up to this long are too short to normalize meaningfully.
pub const MIN_WINDOW_MS: u64 = 200;

/// A clip may undershoot its window by this much before padding is added.
pub const PADDING_TOLERANCE_MS: u64 = 50;

/// Largest speed-up applied to a clip that overruns its window.
///
/// Anything faster sounds unnatural; the remainder is trimmed instead.
pub const MAX_SPEEDUP: f64 = 1.3;

/// Lower bound of a single tempo-shift operation.
pub const TEMPO_MIN: f64 = 0.5;

/// Upper bound of a single tempo-shift operation.
pub const TEMPO_MAX: f64 = 2.0;

/// A cue overlapping the previously kept cue by more than this fraction of
/// its own duration is treated as a duplicate from a chunk overlap region.
pub const DUPLICATE_OVERLAP_RATIO: f64 = 0.8;

/// Nominal length of a transcription chunk window, in seconds.
pub const CHUNK_STEP_SECS: f64 = 600.0;

/// Extra audio appended to every non-final chunk window, in seconds.
///
/// Keeps words that straddle a chunk boundary intact in at least one chunk.
pub const CHUNK_OVERLAP_SECS: f64 = 2.0;

/// Default number of workers per pool.
pub const WORKERS: usize = 4;

/// Default concurrent transcription calls across the process.
pub const TRANSCRIPTION_SLOTS: usize = 2;

/// Default concurrent synthesis calls across the process.
pub const SYNTHESIS_SLOTS: usize = 4;

/// Default concurrent heavy CPU operations (tempo shifts, encodes) across the process.
///
/// Falls back to 2 when the available parallelism cannot be determined.
pub fn heavy_cpu_slots() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_cpu_slots_is_positive() {
        assert!(heavy_cpu_slots() >= 1);
    }

    #[test]
    fn max_speedup_fits_in_single_tempo_step() {
        assert!(MAX_SPEEDUP >= 1.0);
        assert!(MAX_SPEEDUP <= TEMPO_MAX);
    }

    #[test]
    fn thresholds_are_ordered() {
        assert!(MIN_GAP_MS < PADDING_TOLERANCE_MS);
        assert!(PADDING_TOLERANCE_MS < MIN_WINDOW_MS);
    }
}
