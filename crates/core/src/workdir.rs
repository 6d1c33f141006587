//! Scratch directory shared by all jobs.
//!
//! The directory is an append-only namespace: each job only creates and
//! deletes files carrying its own prefix, so no locking is needed.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::cleanup::remove_artifact;
use crate::error::CoreError;
use crate::job::ARTIFACT_STEM_PREFIX;

#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create the directory (and parents) if needed.
    pub async fn ensure(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = Self { root: root.into() };
        dir.prepare().await?;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Recreate the directory if it disappeared since startup.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Files whose name starts with `prefix`, sorted by name.
    pub async fn entries_with_prefix(&self, prefix: &str) -> io::Result<Vec<PathBuf>> {
        list_with_prefix(&self.root, prefix).await
    }

    /// Delete every file belonging to one job. Returns how many were removed.
    ///
    /// Failures are logged and skipped; disk hygiene never fails a request.
    pub async fn purge_prefix(&self, prefix: &str) -> usize {
        let entries = match self.entries_with_prefix(prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, prefix, "Could not list work dir for purge");
                return 0;
            }
        };

        let mut removed = 0;
        for path in entries {
            match remove_artifact(&path).await {
                Ok(true) => {
                    removed += 1;
                    tracing::debug!(path = %path.display(), "Purged job file");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to purge job file");
                }
            }
        }
        removed
    }

    /// Delete artifacts last modified more than `max_age` ago.
    pub async fn sweep_older_than(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for path in self.entries_with_prefix(ARTIFACT_STEM_PREFIX).await? {
            let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }
            match remove_artifact(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to sweep stale file");
                }
            }
        }
        Ok(removed)
    }
}

/// List regular files in `dir` whose name starts with `prefix`, sorted by name.
pub async fn list_with_prefix(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut matches = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(prefix) {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            matches.push(entry.path());
        }
    }

    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_creates_nested_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("a").join("b");
        let dir = WorkDir::ensure(&root).await.expect("ensure");
        assert!(dir.path().is_dir());

        // Idempotent.
        WorkDir::ensure(&root).await.expect("ensure again");
    }

    #[tokio::test]
    async fn prefix_listing_ignores_other_jobs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = WorkDir::ensure(tmp.path()).await.expect("ensure");
        std::fs::write(tmp.path().join("audio_10.mp3"), b"x").expect("write");
        std::fs::write(tmp.path().join("audio_100.mp3"), b"x").expect("write");
        std::fs::write(tmp.path().join("other.txt"), b"x").expect("write");
        std::fs::create_dir(tmp.path().join("audio_10.dir")).expect("mkdir");

        let found = dir.entries_with_prefix("audio_10.").await.expect("list");
        assert_eq!(found, vec![tmp.path().join("audio_10.mp3")]);
    }

    #[tokio::test]
    async fn purge_removes_only_the_job_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = WorkDir::ensure(tmp.path()).await.expect("ensure");
        std::fs::write(tmp.path().join("audio_7.webm.part"), b"x").expect("write");
        std::fs::write(tmp.path().join("audio_7.mp3"), b"x").expect("write");
        std::fs::write(tmp.path().join("audio_8.mp3"), b"x").expect("write");

        assert_eq!(dir.purge_prefix("audio_7.").await, 2);
        assert!(tmp.path().join("audio_8.mp3").exists());
        assert_eq!(dir.purge_prefix("audio_7.").await, 0);
    }

    #[tokio::test]
    async fn sweep_respects_max_age() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = WorkDir::ensure(tmp.path()).await.expect("ensure");
        std::fs::write(tmp.path().join("audio_1.mp3"), b"x").expect("write");
        std::fs::write(tmp.path().join("keep.txt"), b"x").expect("write");

        assert_eq!(dir.sweep_older_than(Duration::from_secs(3600)).await.expect("sweep"), 0);
        assert_eq!(dir.sweep_older_than(Duration::ZERO).await.expect("sweep"), 1);
        assert!(!tmp.path().join("audio_1.mp3").exists());
        assert!(tmp.path().join("keep.txt").exists());
    }
}
