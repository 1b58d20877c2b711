use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dubweave::audio::toolkit;
use dubweave::cli::{Cli, Commands};
use dubweave::config::{Config, ToolBackend};
use dubweave::dub::{DubCue, DubStage};
use dubweave::exec::{GateSet, ProgressReceiver, progress_channel};
use dubweave::synth::{CommandSynthesizer, Synthesizer, Unconfigured};
use dubweave::timeline::{AssembledTimeline, TimelineRules};
use dubweave::transcript::{Chunk, ChunkPlan, ChunkStitcher};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();
    dubweave::logging::init(cli.verbose, cli.quiet);
    tracing::debug!(version = %dubweave::version_string(), "dubweave starting");

    match cli.command {
        Commands::Assemble {
            cues,
            output,
            workers,
            tools,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(workers) = workers {
                config.pool.workers = workers;
            }
            if let Some(backend) = tools {
                config.tools.backend = backend;
            }
            config.validate()?;
            run_assemble(&config, &cues, &output, json, cli.quiet)?;
        }
        Commands::Stitch { chunks, output } => {
            let config = load_config(cli.config.as_deref())?;
            config.validate()?;
            run_stitch(&config, &chunks, output.as_deref(), cli.quiet)?;
        }
        Commands::Plan {
            duration,
            step,
            overlap,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_plan(&config, duration, step, overlap)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dubweave", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/dubweave/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };

    Ok(config.with_env_overrides())
}

fn run_assemble(
    config: &Config,
    cues_path: &Path,
    output: &Path,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let contents = std::fs::read_to_string(cues_path)
        .with_context(|| format!("Failed to read cues from {}", cues_path.display()))?;
    let cues: Vec<DubCue> = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid cue file {}", cues_path.display()))?;

    let format = config.timeline.format();
    let toolkit = toolkit::from_config(&config.tools, format);
    let synthesizer: Arc<dyn Synthesizer> = if config.synthesis.is_configured() {
        Arc::new(CommandSynthesizer::from_template(&config.synthesis.command)?)
    } else {
        Arc::new(Unconfigured)
    };
    if config.tools.backend == ToolBackend::Ffmpeg {
        tracing::debug!(ffmpeg = %config.tools.ffmpeg, ffprobe = %config.tools.ffprobe, "using ffmpeg toolkit");
    }

    let (progress_tx, progress_rx) = progress_channel();
    let stage = DubStage::new(synthesizer, toolkit, GateSet::from_config(&config.gates))
        .with_rules(TimelineRules::from_config(&config.timeline))
        .with_workers(config.pool.workers)
        .with_progress(progress_tx);

    let show_bar = !quiet && !json && std::io::stderr().is_terminal();
    let report = std::thread::scope(|scope| {
        scope.spawn(move || drain_progress(progress_rx, show_bar.then(progress_bar)));
        let result = stage.run(&cues, output);
        // Closes the progress stream so the drain thread exits.
        drop(stage);
        result
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_summary(&report);
    }
    Ok(())
}

fn run_stitch(config: &Config, chunks_path: &Path, output: Option<&Path>, quiet: bool) -> Result<()> {
    let contents = std::fs::read_to_string(chunks_path)
        .with_context(|| format!("Failed to read chunks from {}", chunks_path.display()))?;
    let chunks: Vec<Chunk> = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid chunk file {}", chunks_path.display()))?;
    let chunk_count = chunks.len();

    let cues = ChunkStitcher::with_config(config.stitcher.clone()).stitch(chunks)?;
    let rendered = serde_json::to_string_pretty(&cues)?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} {} chunks → {} cues in {}",
                    "✓".green(),
                    chunk_count,
                    cues.len(),
                    path.display()
                );
            }
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn run_plan(
    config: &Config,
    total: Duration,
    step: Option<Duration>,
    overlap: Option<Duration>,
) -> Result<()> {
    let plan = ChunkPlan::new(
        step.unwrap_or_else(|| config.chunking.step()),
        overlap.unwrap_or_else(|| config.chunking.overlap()),
    );
    let windows = plan.windows(total)?;
    println!("{}", serde_json::to_string_pretty(&windows)?);
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        // SAFETY: hardcoded template string, always valid
        #[allow(clippy::expect_used)]
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:<10} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("hardcoded progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Render pool progress until every sender is gone.
fn drain_progress(events: ProgressReceiver, bar: Option<ProgressBar>) {
    let mut stage = "";
    let mut failures = 0usize;
    for event in events {
        if event.failed {
            failures += 1;
        }
        let Some(bar) = &bar else {
            continue;
        };
        if event.stage != stage {
            stage = event.stage;
            bar.reset();
            bar.set_length(event.total as u64);
            bar.set_message(stage);
        }
        bar.set_position(event.completed as u64);
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    if failures > 0 {
        tracing::debug!(failures, "work items failed");
    }
}

fn print_summary(report: &AssembledTimeline) {
    println!(
        "{} {} ({:.2}s, {} segments)",
        "✓".green(),
        report.path.display(),
        report.duration.as_secs_f64(),
        report.segments
    );
    if report.adjusted > 0 {
        println!(
            "  {} clips sped up, {} trimmed to their window",
            report.adjusted, report.trimmed
        );
    }
    if report.fallbacks > 0 {
        let warning = format!(
            "  {} clips kept their original length after a failed adjustment",
            report.fallbacks
        );
        println!("{}", warning.yellow());
    }
}
