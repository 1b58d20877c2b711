//! dubweave - ordered parallel execution and gapless audio-timeline reconstruction
//!
//! Transcription chunks, synthesized clips and gap silences are produced in
//! parallel under process-wide resource gates, then merged back into one
//! ordered cue list or one time-synchronized audio file.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dub;
pub mod error;
pub mod exec;
#[cfg(feature = "cli")]
pub mod logging;
pub mod synth;
pub mod timeline;
pub mod transcript;

// Collaborator seams
pub use audio::{AudioToolkit, CommandExecutor, SystemCommandExecutor};
pub use synth::Synthesizer;
pub use transcript::ChunkTranscriber;

// Execution
pub use exec::{CancelToken, GateSet, ProgressEvent, ResourceGate, WorkPool};

// Stages
pub use dub::{DubCue, DubStage};
pub use timeline::{AssembledTimeline, ParallelTimeline, TimelineAssembler};
pub use transcript::{ChunkStitcher, ChunkedTranscription, Cue};

// Error handling
pub use error::{DubError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
