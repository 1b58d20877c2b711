use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Per-job scratch directory for intermediate segments.
///
/// Every file a job renders lives here. The directory and its contents are
/// removed when the workspace is dropped, on success and on error alike.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
    counter: AtomicUsize,
}

impl JobWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("dubweave-job-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "created job workspace");
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    /// Create the workspace under `parent` instead of the system temp dir.
    pub fn in_dir(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("dubweave-job-")
            .tempdir_in(parent)?;
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Deterministic path for artifact `kind` of cue or unit `index`.
    pub fn file(&self, kind: &str, index: usize) -> PathBuf {
        self.dir.path().join(format!("{kind}-{index:05}.wav"))
    }

    /// Fresh path that no other caller of `unique` will receive.
    pub fn unique(&self, kind: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("{kind}-u{n:05}.wav"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = JobWorkspace::new().unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(workspace.file("clip", 1), b"x").unwrap();
        assert!(path.exists());

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_file_names_are_stable_and_ordered() {
        let workspace = JobWorkspace::new().unwrap();
        let a = workspace.file("gap", 2);
        let b = workspace.file("gap", 10);
        assert_eq!(a, workspace.file("gap", 2));
        assert!(a < b);
        assert!(a.starts_with(workspace.path()));
    }

    #[test]
    fn test_unique_paths_differ() {
        let parent = tempfile::TempDir::new().unwrap();
        let workspace = JobWorkspace::in_dir(parent.path()).unwrap();
        assert_ne!(workspace.unique("tmp"), workspace.unique("tmp"));
        assert!(workspace.path().starts_with(parent.path()));
    }
}
