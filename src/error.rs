//! Error types for dubweave.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // External tool errors (transient; retry policy belongs to the caller)
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    // Structural input errors (fatal to the stage)
    #[error("Cue list is empty")]
    EmptyCueList,

    #[error("Cue {index} starts before the previous cue")]
    UnsortedCues { index: usize },

    #[error("Cue {index} ends before it starts")]
    InvertedCue { index: usize },

    #[error("No segments to concatenate")]
    NoSegments,

    #[error("No chunks to stitch")]
    NoChunks,

    #[error("Cue {index} has text but no synthesized clip")]
    MissingClip { index: usize },

    // Duration adjustment errors
    #[error("Tempo factor {factor} is outside the supported range")]
    TempoOutOfRange { factor: f64 },

    #[error("Duration adjustment failed for cue {index}: {message}")]
    Adjustment { index: usize, message: String },

    // Errors mapped back to the item that produced them
    #[error("Work item {index} failed: {source}")]
    WorkItem {
        index: usize,
        #[source]
        source: Box<DubError>,
    },

    #[error("Chunk {index} failed to transcribe: {source}")]
    ChunkFailed {
        index: usize,
        #[source]
        source: Box<DubError>,
    },

    #[error("Synthesis failed for cue {index}: {message}")]
    Synthesis { index: usize, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Audio file errors
    #[error("Audio error: {message}")]
    Audio { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl DubError {
    /// Wraps an error with the index of the work item that produced it.
    pub fn at_item(index: usize, source: DubError) -> Self {
        DubError::WorkItem {
            index,
            source: Box::new(source),
        }
    }

    /// Index of the cue, chunk or work item this error refers to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            DubError::UnsortedCues { index }
            | DubError::InvertedCue { index }
            | DubError::MissingClip { index }
            | DubError::Adjustment { index, .. }
            | DubError::WorkItem { index, .. }
            | DubError::ChunkFailed { index, .. }
            | DubError::Synthesis { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Errors caused by malformed stage input. These abort the stage.
    pub fn is_structural(&self) -> bool {
        match self {
            DubError::EmptyCueList
            | DubError::UnsortedCues { .. }
            | DubError::InvertedCue { .. }
            | DubError::NoSegments
            | DubError::NoChunks
            | DubError::MissingClip { .. } => true,
            DubError::WorkItem { source, .. } | DubError::ChunkFailed { source, .. } => {
                source.is_structural()
            }
            _ => false,
        }
    }

    /// External tool failures a caller may decide to retry.
    pub fn is_transient(&self) -> bool {
        match self {
            DubError::ToolNotFound { .. } | DubError::ToolFailed { .. } => true,
            DubError::WorkItem { source, .. } | DubError::ChunkFailed { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }
}

impl From<hound::Error> for DubError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => DubError::Io(io),
            other => DubError::Audio {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, DubError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = DubError::ConfigInvalidValue {
            key: "pool.workers".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for pool.workers: must be positive"
        );
    }

    #[test]
    fn test_tool_failed_display() {
        let error = DubError::ToolFailed {
            tool: "ffmpeg".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(error.to_string(), "ffmpeg failed: exit status 1");
    }

    #[test]
    fn test_work_item_carries_index_and_source() {
        let error = DubError::at_item(
            7,
            DubError::ToolNotFound {
                tool: "ffprobe".to_string(),
            },
        );
        assert_eq!(error.index(), Some(7));
        assert_eq!(
            error.to_string(),
            "Work item 7 failed: External tool not found: ffprobe"
        );
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_chunk_failed_display() {
        let error = DubError::ChunkFailed {
            index: 2,
            source: Box::new(DubError::Other("model crashed".to_string())),
        };
        assert_eq!(
            error.to_string(),
            "Chunk 2 failed to transcribe: model crashed"
        );
        assert_eq!(error.index(), Some(2));
    }

    #[test]
    fn test_structural_classification() {
        assert!(DubError::EmptyCueList.is_structural());
        assert!(DubError::NoSegments.is_structural());
        assert!(DubError::MissingClip { index: 3 }.is_structural());
        assert!(DubError::InvertedCue { index: 4 }.is_structural());
        assert!(DubError::at_item(1, DubError::NoChunks).is_structural());
        assert!(!DubError::Cancelled.is_structural());
    }

    #[test]
    fn test_transient_classification() {
        let tool = DubError::ToolFailed {
            tool: "ffmpeg".to_string(),
            message: "boom".to_string(),
        };
        assert!(tool.is_transient());
        assert!(DubError::at_item(0, tool).is_transient());
        assert!(!DubError::EmptyCueList.is_transient());
    }

    #[test]
    fn test_inverted_cue_display() {
        let error = DubError::InvertedCue { index: 6 };
        assert_eq!(error.to_string(), "Cue 6 ends before it starts");
        assert_eq!(error.index(), Some(6));
    }

    #[test]
    fn test_index_absent_for_global_errors() {
        assert_eq!(DubError::NoSegments.index(), None);
        assert_eq!(DubError::Cancelled.index(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: DubError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_hound_io_error_maps_to_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let error: DubError = hound::Error::IoError(io_error).into();
        assert!(matches!(error, DubError::Io(_)));
    }

    #[test]
    fn test_from_hound_format_error_maps_to_audio() {
        let error: DubError = hound::Error::FormatError("bad header").into();
        assert!(matches!(error, DubError::Audio { .. }));
        assert!(error.to_string().contains("bad header"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: DubError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<DubError>();
        assert_sync::<DubError>();
    }
}
