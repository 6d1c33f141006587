//! Deferred deletion of delivered artifacts.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Delay between the end of a delivery and the deletion of its artifact.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(5);

/// Delete a file, treating "already gone" as success.
///
/// Returns `Ok(true)` when this call removed the file and `Ok(false)` when it
/// was already absent.
pub async fn remove_artifact(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Schedules artifact deletion a fixed delay after delivery, so the transport
/// has finished with the file before it disappears.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    delay: Duration,
}

impl Default for CleanupScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_DELAY)
    }
}

impl CleanupScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Spawn the deferred deletion of `path`.
    ///
    /// Returns `None` when called outside a Tokio runtime (e.g. a response
    /// body dropped during runtime shutdown); the janitor picks those up.
    pub fn schedule(&self, path: PathBuf) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(path = %path.display(), "No runtime available, cleanup skipped");
                return None;
            }
        };

        let delay = self.delay;
        Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            match remove_artifact(&path).await {
                Ok(true) => tracing::info!(path = %path.display(), "Temp file deleted"),
                Ok(false) => {
                    tracing::debug!(path = %path.display(), "Temp file already gone")
                }
                Err(e) => {
                    tracing::error!(error = %e, path = %path.display(), "Error deleting temp file")
                }
            }
        }))
    }
}
