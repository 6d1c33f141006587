//! Per-request job naming.
//!
//! A job id is the acceptance time in epoch milliseconds, bumped so that it
//! is strictly increasing within the process. Every file a job writes is
//! named `audio_<id>.<ext>`, which keeps concurrent jobs in disjoint parts
//! of the shared work dir.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

/// Stem prefix shared by every artifact in the work dir.
pub const ARTIFACT_STEM_PREFIX: &str = "audio_";

/// Extension placeholder understood by the extractor's output template.
const EXTENSION_PLACEHOLDER: &str = "%(ext)s";

static LAST_ISSUED_ID: AtomicI64 = AtomicI64::new(0);

/// Reserve a job id no smaller than `now_ms` and larger than any id
/// previously issued by this process.
pub fn next_job_id(now_ms: i64) -> i64 {
    let previous = LAST_ISSUED_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now_ms.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now_ms.max(previous + 1)
}

/// Identity of one in-flight conversion. Never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobToken {
    id: i64,
    work_dir: PathBuf,
}

impl JobToken {
    /// Issue a fresh token for a request accepted now.
    pub fn issue(work_dir: &Path) -> Self {
        Self::with_id(
            next_job_id(chrono::Utc::now().timestamp_millis()),
            work_dir,
        )
    }

    /// Build a token with an explicit id (tests and external resolvers).
    pub fn with_id(id: i64, work_dir: &Path) -> Self {
        Self {
            id,
            work_dir: work_dir.to_path_buf(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// File stem without extension, e.g. `audio_1700000000000`.
    pub fn stem(&self) -> String {
        format!("{ARTIFACT_STEM_PREFIX}{}", self.id)
    }

    /// Prefix every file of this job starts with, including the extension dot.
    pub fn artifact_prefix(&self) -> String {
        format!("{}.", self.stem())
    }

    /// Output template handed to the extractor; it picks the extension.
    pub fn output_template(&self) -> PathBuf {
        self.work_dir
            .join(format!("{}.{EXTENSION_PLACEHOLDER}", self.stem()))
    }
}
