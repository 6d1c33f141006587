//! Post-exit artifact discovery.
//!
//! The extractor picks the final extension, so after a clean exit the work
//! dir is scanned once for the job's prefix. Alternate capabilities can
//! plug in their own [`ArtifactResolver`].

use std::time::Duration;

use async_trait::async_trait;

use crate::job::JobToken;
use crate::outcome::{Artifact, TerminalOutcome};
use crate::workdir::list_with_prefix;

/// Grace period before listing, for filesystems with delayed write visibility.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Map a clean exit to `Completed`, `ArtifactMissing` or `ArtifactEmpty`.
    ///
    /// Called at most once per job.
    async fn resolve(&self, job: &JobToken) -> TerminalOutcome;
}

/// Finds the first file named `audio_<id>.*` in the job's work dir.
#[derive(Debug, Clone)]
pub struct PrefixResolver {
    settle_delay: Duration,
}

impl Default for PrefixResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl PrefixResolver {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }
}

#[async_trait]
impl ArtifactResolver for PrefixResolver {
    async fn resolve(&self, job: &JobToken) -> TerminalOutcome {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let prefix = job.artifact_prefix();
        let candidates = match list_with_prefix(job.work_dir(), &prefix).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, job_id = job.id(), "Could not list work dir");
                return TerminalOutcome::ArtifactMissing;
            }
        };

        let Some(path) = candidates.into_iter().next() else {
            tracing::error!(job_id = job.id(), %prefix, "File not found after conversion");
            return TerminalOutcome::ArtifactMissing;
        };

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "Artifact vanished before stat");
                return TerminalOutcome::ArtifactMissing;
            }
        };

        if size_bytes == 0 {
            tracing::error!(job_id = job.id(), path = %path.display(), "Empty file generated");
            return TerminalOutcome::ArtifactEmpty(path);
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.stem());

        tracing::info!(
            job_id = job.id(),
            file_name = %file_name,
            size_mb = %format!("{:.2}", size_bytes as f64 / 1024.0 / 1024.0),
            "File found"
        );

        TerminalOutcome::Completed(Artifact {
            path,
            file_name,
            size_bytes,
        })
    }
}
