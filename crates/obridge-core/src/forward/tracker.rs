use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Transient files created while composing, handed back to the caller for deletion
/// once the bundle has been sent (or sending failed).
#[derive(Debug, Default)]
pub struct ResourceTracker {
    paths: Vec<PathBuf>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the path was already listed.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.paths.contains(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    pub fn list(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Moves every path of a nested composition into this tracker.
    pub fn absorb(&mut self, child: ResourceTracker) {
        for path in child.paths {
            self.register(path);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Removes every listed file. Missing files are fine; other failures are logged.
    pub async fn cleanup(self) {
        for path in self.paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed transient file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "failed to remove transient file: {e}"),
            }
        }
    }
}
