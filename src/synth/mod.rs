//! Speech synthesis collaborators.
//!
//! The dub stage only needs `synthesize(text) -> clip`. Whichever TTS backend
//! is active plugs in behind `Synthesizer`.

pub mod command;
pub mod mock;

pub use command::CommandSynthesizer;
pub use mock::MockSynthesizer;

use crate::error::{DubError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for turning cue text into a speech clip.
///
/// Implementations write a WAV file at or near `out` and return its path.
/// Any sample rate or channel layout is accepted; clips are conformed before
/// they enter the timeline.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str, out: &Path) -> Result<PathBuf>;

    /// Name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Implement Synthesizer for Arc<T> to allow sharing across jobs.
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    fn synthesize(&self, text: &str, out: &Path) -> Result<PathBuf> {
        (**self).synthesize(text, out)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Stand-in used when no TTS backend is configured.
///
/// Every request fails, so cues without a pre-rendered clip surface as a
/// synthesis error naming the cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfigured;

impl Synthesizer for Unconfigured {
    fn synthesize(&self, _text: &str, _out: &Path) -> Result<PathBuf> {
        Err(DubError::ConfigInvalidValue {
            key: "synthesis.command".to_string(),
            message: "no synthesis command configured".to_string(),
        })
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_always_fails() {
        let synth: Arc<dyn Synthesizer> = Arc::new(Unconfigured);
        let err = synth
            .synthesize("hello", Path::new("/tmp/never.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("synthesis.command"));
        assert_eq!(synth.name(), "unconfigured");
    }
}
