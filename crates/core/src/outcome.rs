//! Terminal outcomes of one conversion attempt.

use std::path::PathBuf;
use std::time::Duration;

/// A resolved artifact ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Name announced to the caller in `Content-Disposition`.
    pub file_name: String,
    pub size_bytes: u64,
}

/// The single classified result of a conversion.
///
/// Exactly one of these reaches the caller per request; the
/// [`CompletionGuard`](crate::guard::CompletionGuard) discards the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed(Artifact),
    TimedOut {
        after: Duration,
    },
    ProcessLaunchFailed(String),
    ProcessExitedNonZero {
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },
    ArtifactMissing,
    ArtifactEmpty(PathBuf),
    StreamFailed(String),
    /// The caller went away before an outcome was produced. Never rendered.
    Cancelled,
}

impl TerminalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Stable category string used as the `error` field of failure bodies.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Completed(_) => "Completed",
            Self::TimedOut { .. } => "Conversion timeout",
            Self::ProcessLaunchFailed(_) => "Failed to start conversion process",
            Self::ProcessExitedNonZero { .. } => "Conversion failed",
            Self::ArtifactMissing => "File not found after conversion",
            Self::ArtifactEmpty(_) => "Empty file generated",
            Self::StreamFailed(_) => "Error reading file",
            Self::Cancelled => "Conversion cancelled",
        }
    }

    /// Human-readable diagnostic. Not yet bounded; see [`crate::excerpt`].
    pub fn details(&self) -> String {
        match self {
            Self::Completed(artifact) => format!(
                "{} ({} bytes)",
                artifact.file_name, artifact.size_bytes
            ),
            Self::TimedOut { after } => format!(
                "Process took longer than {}. Video might be too long or connection is slow.",
                humanize(*after)
            ),
            Self::ProcessLaunchFailed(reason) => reason.clone(),
            Self::ProcessExitedNonZero {
                exit_code,
                stderr_excerpt,
            } => {
                let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
                if stderr_excerpt.is_empty() {
                    format!("Extractor exited with code {code}")
                } else {
                    format!("Extractor exited with code {code}: {stderr_excerpt}")
                }
            }
            Self::ArtifactMissing => {
                "Conversion completed but output file was not found. Check temp directory permissions."
                    .to_string()
            }
            Self::ArtifactEmpty(_) => "Conversion completed but output file is empty.".to_string(),
            Self::StreamFailed(reason) => reason.clone(),
            Self::Cancelled => "Caller disconnected before the conversion finished.".to_string(),
        }
    }
}

fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        format!("{minutes} minute{}", if minutes == 1 { "" } else { "s" })
    } else if secs >= 1 {
        format!("{secs} second{}", if secs == 1 { "" } else { "s" })
    } else {
        format!("{} ms", duration.as_millis())
    }
}
