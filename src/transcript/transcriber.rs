use crate::error::{DubError, Result};
use crate::transcript::types::{ChunkWindow, Cue};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for transcribing one chunk window of the source audio.
///
/// Implemented by whichever speech-to-text backend is active. Returned cues
/// are timed relative to `window.start`.
pub trait ChunkTranscriber: Send + Sync {
    fn transcribe_window(&self, window: &ChunkWindow) -> Result<Vec<Cue>>;

    /// Name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Implement ChunkTranscriber for Arc<T> to allow sharing across jobs.
impl<T: ChunkTranscriber> ChunkTranscriber for Arc<T> {
    fn transcribe_window(&self, window: &ChunkWindow) -> Result<Vec<Cue>> {
        (**self).transcribe_window(window)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock transcriber for testing.
///
/// Returns a fixed set of chunk-relative cues for every window, optionally
/// failing on selected chunk indices.
#[derive(Debug, Default)]
pub struct MockChunkTranscriber {
    name: String,
    cues: Vec<Cue>,
    failing: HashSet<usize>,
    calls: AtomicUsize,
}

impl MockChunkTranscriber {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Cues returned for every window.
    pub fn with_cues(mut self, cues: Vec<Cue>) -> Self {
        self.cues = cues;
        self
    }

    /// Fail when asked to transcribe the window with this index.
    pub fn with_failure_at(mut self, index: usize) -> Self {
        self.failing.insert(index);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChunkTranscriber for MockChunkTranscriber {
    fn transcribe_window(&self, window: &ChunkWindow) -> Result<Vec<Cue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&window.index) {
            return Err(DubError::ToolFailed {
                tool: self.name.clone(),
                message: "mock transcription failure".to_string(),
            });
        }
        Ok(self
            .cues
            .iter()
            .filter(|cue| cue.start < window.duration)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn window(index: usize, secs: u64) -> ChunkWindow {
        ChunkWindow {
            index,
            start: Duration::from_secs(index as u64 * secs),
            duration: Duration::from_secs(secs),
            has_overlap: false,
        }
    }

    #[test]
    fn test_mock_returns_cues_inside_window() {
        let transcriber = MockChunkTranscriber::new("mock").with_cues(vec![
            Cue::from_secs(0, 1.0, 2.0, "inside"),
            Cue::from_secs(1, 15.0, 16.0, "outside"),
        ]);
        let cues = transcriber.transcribe_window(&window(0, 10)).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "inside");
        assert_eq!(transcriber.call_count(), 1);
    }

    #[test]
    fn test_mock_fails_on_configured_index() {
        let transcriber = MockChunkTranscriber::new("mock").with_failure_at(1);
        assert!(transcriber.transcribe_window(&window(0, 10)).is_ok());
        let err = transcriber.transcribe_window(&window(1, 10)).unwrap_err();
        assert!(err.to_string().contains("mock transcription failure"));
    }

    #[test]
    fn test_arc_delegates() {
        let transcriber = Arc::new(MockChunkTranscriber::new("shared"));
        assert_eq!(ChunkTranscriber::name(&transcriber), "shared");
    }
}
