//! Audio primitives the timeline is built from.
//!
//! `AudioToolkit` is the seam between timeline logic and the tools that
//! actually touch audio files. `WavToolkit` does everything in-process with
//! hound; `FfmpegToolkit` shells out to ffmpeg/ffprobe through a
//! `CommandExecutor`.

use crate::audio::command::{CommandExecutor, SystemCommandExecutor};
use crate::audio::format::PcmFormat;
use crate::audio::{tempo, wav};
use crate::config::{ToolBackend, ToolsConfig};
use crate::error::{DubError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub trait AudioToolkit: Send + Sync {
    fn name(&self) -> &str;

    /// Format every file this toolkit writes.
    fn format(&self) -> PcmFormat;

    fn probe_duration(&self, path: &Path) -> Result<Duration>;

    fn write_silence(&self, duration: Duration, out: &Path) -> Result<()>;

    /// Re-encode `input` into `format()`, returning the new duration.
    fn conform(&self, input: &Path, out: &Path) -> Result<Duration>;

    /// Single tempo step. `factor` must be inside the primitive range.
    fn tempo(&self, input: &Path, factor: f64, out: &Path) -> Result<()>;

    fn trim(&self, input: &Path, length: Duration, out: &Path) -> Result<()>;

    /// Join files in manifest order, returning the total duration.
    fn concatenate(&self, manifest: &[PathBuf], out: &Path) -> Result<Duration>;

    /// Apply any positive tempo factor by chaining in-range steps.
    fn tempo_chained(&self, input: &Path, factor: f64, out: &Path) -> Result<()> {
        let steps = tempo::tempo_chain(factor)?;
        if let [single] = steps.as_slice() {
            return self.tempo(input, *single, out);
        }

        let mut intermediates = Vec::with_capacity(steps.len() - 1);
        let mut current = input.to_path_buf();
        let result = (|| -> Result<()> {
            for (i, &step) in steps.iter().enumerate() {
                let target = if i + 1 == steps.len() {
                    out.to_path_buf()
                } else {
                    let path = out.with_extension(format!("step{i}.wav"));
                    intermediates.push(path.clone());
                    path
                };
                self.tempo(&current, step, &target)?;
                current = target;
            }
            Ok(())
        })();

        for path in &intermediates {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::debug!(path = %path.display(), error = %e, "could not remove tempo step");
            }
        }
        result
    }
}

impl<T: AudioToolkit + ?Sized> AudioToolkit for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn format(&self) -> PcmFormat {
        (**self).format()
    }
    fn probe_duration(&self, path: &Path) -> Result<Duration> {
        (**self).probe_duration(path)
    }
    fn write_silence(&self, duration: Duration, out: &Path) -> Result<()> {
        (**self).write_silence(duration, out)
    }
    fn conform(&self, input: &Path, out: &Path) -> Result<Duration> {
        (**self).conform(input, out)
    }
    fn tempo(&self, input: &Path, factor: f64, out: &Path) -> Result<()> {
        (**self).tempo(input, factor, out)
    }
    fn trim(&self, input: &Path, length: Duration, out: &Path) -> Result<()> {
        (**self).trim(input, length, out)
    }
    fn concatenate(&self, manifest: &[PathBuf], out: &Path) -> Result<Duration> {
        (**self).concatenate(manifest, out)
    }
}

/// In-process toolkit built on hound and the native time stretcher.
#[derive(Debug, Clone, Default)]
pub struct WavToolkit {
    format: PcmFormat,
}

impl WavToolkit {
    pub fn new(format: PcmFormat) -> Self {
        Self { format }
    }

    fn read_conformed(&self, input: &Path) -> Result<Vec<i16>> {
        let clip = wav::read_clip(input)?;
        if clip.sample_rate == self.format.sample_rate && clip.channels == self.format.channels {
            Ok(clip.samples)
        } else {
            Ok(wav::conform(&clip, self.format))
        }
    }
}

impl AudioToolkit for WavToolkit {
    fn name(&self) -> &str {
        "native"
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn probe_duration(&self, path: &Path) -> Result<Duration> {
        wav::wav_duration(path)
    }

    fn write_silence(&self, duration: Duration, out: &Path) -> Result<()> {
        wav::write_silence(out, duration, self.format)
    }

    fn conform(&self, input: &Path, out: &Path) -> Result<Duration> {
        let samples = self.read_conformed(input)?;
        wav::write_samples(out, &samples, self.format)?;
        Ok(self.format.duration_of(samples.len()))
    }

    fn tempo(&self, input: &Path, factor: f64, out: &Path) -> Result<()> {
        tempo::check_step(factor)?;
        let samples = self.read_conformed(input)?;
        let stretched = tempo::time_stretch(
            &samples,
            self.format.channels,
            self.format.sample_rate,
            factor,
        )?;
        wav::write_samples(out, &stretched, self.format)
    }

    fn trim(&self, input: &Path, length: Duration, out: &Path) -> Result<()> {
        let mut samples = self.read_conformed(input)?;
        wav::truncate(&mut samples, length, self.format);
        wav::write_samples(out, &samples, self.format)
    }

    fn concatenate(&self, manifest: &[PathBuf], out: &Path) -> Result<Duration> {
        wav::concatenate(manifest, out, self.format)
    }
}

/// Toolkit that drives ffmpeg and ffprobe.
#[derive(Debug)]
pub struct FfmpegToolkit<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    ffmpeg: String,
    ffprobe: String,
    format: PcmFormat,
}

impl FfmpegToolkit<SystemCommandExecutor> {
    pub fn new(format: PcmFormat) -> Self {
        Self::with_executor(SystemCommandExecutor::new(), format)
    }
}

impl<E: CommandExecutor> FfmpegToolkit<E> {
    pub fn with_executor(executor: E, format: PcmFormat) -> Self {
        Self {
            executor,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            format,
        }
    }

    /// Use specific ffmpeg/ffprobe binaries instead of the ones on PATH.
    pub fn with_binaries(mut self, ffmpeg: &str, ffprobe: &str) -> Self {
        self.ffmpeg = ffmpeg.to_string();
        self.ffprobe = ffprobe.to_string();
        self
    }

    /// Run ffmpeg writing `out` as PCM in the toolkit's format.
    fn encode(&self, input_args: &[&str], filter: Option<&str>, out: &Path) -> Result<()> {
        let rate = self.format.sample_rate.to_string();
        let channels = self.format.channels.to_string();
        let out = path_str(out)?;

        let mut args: Vec<&str> = vec!["-y", "-hide_banner", "-loglevel", "error"];
        args.extend_from_slice(input_args);
        if let Some(filter) = filter {
            args.extend_from_slice(&["-filter:a", filter]);
        }
        args.extend_from_slice(&[
            "-ar",
            rate.as_str(),
            "-ac",
            channels.as_str(),
            "-c:a",
            "pcm_s16le",
            out,
        ]);

        self.executor.execute(&self.ffmpeg, &args)?;
        Ok(())
    }

    fn channel_layout(&self) -> String {
        match self.format.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n}c"),
        }
    }
}

impl<E: CommandExecutor> AudioToolkit for FfmpegToolkit<E> {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn probe_duration(&self, path: &Path) -> Result<Duration> {
        let output = self.executor.execute(
            &self.ffprobe,
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                path_str(path)?,
            ],
        )?;
        output
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| DubError::ToolFailed {
                tool: self.ffprobe.clone(),
                message: format!(
                    "unparseable duration {:?} for {}",
                    output.trim(),
                    path.display()
                ),
            })
    }

    fn write_silence(&self, duration: Duration, out: &Path) -> Result<()> {
        let source = format!(
            "anullsrc=r={}:cl={}",
            self.format.sample_rate,
            self.channel_layout()
        );
        let length = format!("{:.3}", duration.as_secs_f64());
        self.encode(
            &["-f", "lavfi", "-i", source.as_str(), "-t", length.as_str()],
            None,
            out,
        )
    }

    fn conform(&self, input: &Path, out: &Path) -> Result<Duration> {
        self.encode(&["-i", path_str(input)?], None, out)?;
        self.probe_duration(out)
    }

    fn tempo(&self, input: &Path, factor: f64, out: &Path) -> Result<()> {
        tempo::check_step(factor)?;
        let filter = format!("atempo={factor}");
        self.encode(&["-i", path_str(input)?], Some(&filter), out)
    }

    fn trim(&self, input: &Path, length: Duration, out: &Path) -> Result<()> {
        let length = format!("{:.3}", length.as_secs_f64());
        self.encode(&["-i", path_str(input)?, "-t", length.as_str()], None, out)
    }

    fn concatenate(&self, manifest: &[PathBuf], out: &Path) -> Result<Duration> {
        if manifest.is_empty() {
            return Err(DubError::NoSegments);
        }

        let mut list = tempfile::Builder::new()
            .prefix("dubweave-concat-")
            .suffix(".txt")
            .tempfile()?;
        for path in manifest {
            writeln!(list, "file '{}'", path_str(path)?.replace('\'', "'\\''"))?;
        }
        list.flush()?;

        self.executor.execute(
            &self.ffmpeg,
            &[
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                path_str(list.path())?,
                "-c",
                "copy",
                path_str(out)?,
            ],
        )?;
        self.probe_duration(out)
    }
}

/// Build the toolkit selected in `[tools]`, writing segments in `format`.
pub fn from_config(config: &ToolsConfig, format: PcmFormat) -> Arc<dyn AudioToolkit> {
    match config.backend {
        ToolBackend::Native => Arc::new(WavToolkit::new(format)),
        ToolBackend::Ffmpeg => {
            Arc::new(FfmpegToolkit::new(format).with_binaries(&config.ffmpeg, &config.ffprobe))
        }
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| DubError::Audio {
        message: format!("path is not valid UTF-8: {}", path.display()),
    })
}
