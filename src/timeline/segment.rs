use std::path::{Path, PathBuf};
use std::time::Duration;

/// One rendered piece of the timeline, appended in strict order.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineSegment {
    /// Silence rendered to `path`.
    Silence { path: PathBuf, duration: Duration },
    /// Speech clip at `path`.
    Clip { path: PathBuf, duration: Duration },
}

impl TimelineSegment {
    pub fn silence(path: PathBuf, duration: Duration) -> Self {
        TimelineSegment::Silence { path, duration }
    }

    pub fn clip(path: PathBuf, duration: Duration) -> Self {
        TimelineSegment::Clip { path, duration }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimelineSegment::Silence { duration, .. } | TimelineSegment::Clip { duration, .. } => {
                *duration
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TimelineSegment::Silence { path, .. } | TimelineSegment::Clip { path, .. } => path,
        }
    }

    pub fn is_silence(&self) -> bool {
        matches!(self, TimelineSegment::Silence { .. })
    }
}

/// Sum of segment durations.
pub fn total_duration(segments: &[TimelineSegment]) -> Duration {
    segments.iter().map(TimelineSegment::duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let gap = TimelineSegment::silence(PathBuf::from("gap.wav"), Duration::from_millis(100));
        let clip = TimelineSegment::clip(PathBuf::from("clip.wav"), Duration::from_secs(2));
        assert!(gap.is_silence());
        assert!(!clip.is_silence());
        assert_eq!(clip.path(), Path::new("clip.wav"));
        assert_eq!(total_duration(&[gap, clip]), Duration::from_millis(2100));
    }

    #[test]
    fn test_constructors_share_argument_order() {
        let path = PathBuf::from("piece.wav");
        let length = Duration::from_millis(750);
        let gap = TimelineSegment::silence(path.clone(), length);
        let clip = TimelineSegment::clip(path.clone(), length);

        for segment in [&gap, &clip] {
            assert_eq!(segment.path(), path.as_path());
            assert_eq!(segment.duration(), length);
        }
        assert_eq!(
            gap,
            TimelineSegment::Silence {
                path: path.clone(),
                duration: length
            }
        );
        assert_eq!(clip, TimelineSegment::Clip { path, duration: length });
    }
}
