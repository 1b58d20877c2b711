//! PCM WAV helpers for timeline segments.
//!
//! Reads clips in any common WAV layout and writes 16-bit segments in the
//! job's fixed `PcmFormat`.

use crate::audio::format::PcmFormat;
use crate::error::{DubError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Decoded audio and the layout it was stored in.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Interleaved 16-bit samples.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Clip {
    pub fn duration(&self) -> Duration {
        PcmFormat::new(self.sample_rate, self.channels).duration_of(self.samples.len())
    }
}

/// Decode WAV data of any bit depth into 16-bit samples.
pub fn read_from<R: Read>(reader: R) -> Result<Clip> {
    let mut wav_reader = hound::WavReader::new(reader)?;
    let spec = wav_reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Int, bits) => {
            let shift = i32::from(bits) - 16;
            wav_reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if shift >= 0 {
                            (v >> shift) as i16
                        } else {
                            (v << -shift) as i16
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        (hound::SampleFormat::Float, _) => wav_reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(Clip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

pub fn read_clip(path: &Path) -> Result<Clip> {
    let file = std::fs::File::open(path)?;
    read_from(std::io::BufReader::new(file)).map_err(|e| with_path(e, path))
}

/// Write interleaved samples as a 16-bit WAV in `format`.
pub fn write_samples(path: &Path, samples: &[i16], format: PcmFormat) -> Result<()> {
    let mut writer = hound::WavWriter::create(path, format.wav_spec())?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Duration of a WAV file, read from its header.
pub fn wav_duration(path: &Path) -> Result<Duration> {
    let reader = hound::WavReader::open(path).map_err(|e| with_path(e.into(), path))?;
    let spec = reader.spec();
    Ok(Duration::from_secs_f64(
        reader.duration() as f64 / spec.sample_rate as f64,
    ))
}

/// Write `duration` of digital silence.
pub fn write_silence(path: &Path, duration: Duration, format: PcmFormat) -> Result<()> {
    let samples = vec![0i16; format.samples_for(duration)];
    write_samples(path, &samples, format)
}

/// Convert a clip to `format`: downmix to mono, resample, then fan out to
/// the target channel count.
pub fn conform(clip: &Clip, format: PcmFormat) -> Vec<i16> {
    let mono = to_mono(&clip.samples, clip.channels);
    let resampled = resample(&mono, clip.sample_rate, format.sample_rate);
    if format.channels <= 1 {
        return resampled;
    }
    resampled
        .iter()
        .flat_map(|&s| std::iter::repeat_n(s, format.channels as usize))
        .collect()
}

/// Average interleaved channels into one.
pub fn to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(last);
            let fraction = source_pos - source_idx as f64;

            if source_idx >= last {
                samples[last]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

/// Keep at most `length` of interleaved samples.
pub fn truncate(samples: &mut Vec<i16>, length: Duration, format: PcmFormat) {
    samples.truncate(format.samples_for(length));
}

/// Join WAV files in manifest order into `out`.
///
/// Every input must already be in `format`; segments are copied sample for
/// sample.
pub fn concatenate(manifest: &[PathBuf], out: &Path, format: PcmFormat) -> Result<Duration> {
    if manifest.is_empty() {
        return Err(DubError::NoSegments);
    }

    let mut writer = hound::WavWriter::create(out, format.wav_spec())?;
    let mut written = 0usize;
    for path in manifest {
        let mut reader = hound::WavReader::open(path).map_err(|e| with_path(e.into(), path))?;
        let spec = reader.spec();
        if !format.matches(&spec) {
            return Err(DubError::Audio {
                message: format!(
                    "segment {} is {}Hz/{}ch/{}bit, expected {}",
                    path.display(),
                    spec.sample_rate,
                    spec.channels,
                    spec.bits_per_sample,
                    format
                ),
            });
        }
        for sample in reader.samples::<i16>() {
            writer.write_sample(sample?)?;
            written += 1;
        }
    }
    writer.finalize()?;
    Ok(format.duration_of(written))
}

fn with_path(error: DubError, path: &Path) -> DubError {
    match error {
        DubError::Audio { message } => DubError::Audio {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    }
}
