//! Command-line interface for dubweave
//!
//! Provides argument parsing using clap derive macros.

use crate::config::ToolBackend;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Parallel transcription stitching and timed speech assembly
#[derive(Parser, Debug)]
#[command(
    name = "dubweave",
    version,
    about = "Parallel transcription stitching and timed speech assembly"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: stage summaries, -vv: per-segment diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize cues and assemble them into one timed audio file
    Assemble {
        /// JSON array of cues: {"start", "end", "text", optional "clip"}
        #[arg(long, value_name = "FILE")]
        cues: PathBuf,

        /// Output WAV file
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,

        /// Worker count override (default: pool.workers from config)
        #[arg(long, short = 'w', value_name = "N")]
        workers: Option<usize>,

        /// Audio toolkit override (native, ffmpeg)
        #[arg(long, value_name = "BACKEND")]
        tools: Option<ToolBackend>,

        /// Print the assembly report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge overlapping chunk transcripts into one cue list
    Stitch {
        /// JSON array of chunks with chunk-local cues
        #[arg(long, value_name = "FILE")]
        chunks: PathBuf,

        /// Write merged cues here instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the chunk windows for an audio length
    Plan {
        /// Total audio length. Examples: 90s, 45m, 1h30m
        #[arg(long, short = 'd', value_name = "DURATION", value_parser = parse_duration)]
        duration: Duration,

        /// Nominal chunk length (default: chunking.step_secs)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        step: Option<Duration>,

        /// Overlap added to every non-final chunk (default: chunking.overlap_secs)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        overlap: Option<Duration>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`, plus bare numbers
/// (seconds, fractional allowed).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs)
            .map_err(|e| format!("invalid duration {}: {}", s, e));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2.5").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-3").is_err());
        assert!(parse_duration("1e30").is_err());
        assert!(parse_duration("NaN").is_err());
    }

    #[test]
    fn test_assemble_args() {
        let cli = Cli::try_parse_from([
            "dubweave", "-vv", "assemble", "--cues", "cues.json", "-o", "out.wav", "-w", "4",
            "--tools", "ffmpeg",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Assemble {
                cues,
                output,
                workers,
                tools,
                json,
            } => {
                assert_eq!(cues, PathBuf::from("cues.json"));
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(workers, Some(4));
                assert_eq!(tools, Some(ToolBackend::Ffmpeg));
                assert!(!json);
            }
            other => panic!("Expected Assemble, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_args() {
        let cli = Cli::try_parse_from(["dubweave", "plan", "--duration", "25m", "--step", "10m"])
            .unwrap();
        match cli.command {
            Commands::Plan {
                duration,
                step,
                overlap,
            } => {
                assert_eq!(duration, Duration::from_secs(1500));
                assert_eq!(step, Some(Duration::from_secs(600)));
                assert_eq!(overlap, None);
            }
            other => panic!("Expected Plan, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dubweave",
            "stitch",
            "--chunks",
            "c.json",
            "--quiet",
            "--config",
            "/tmp/d.toml",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/d.toml")));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
