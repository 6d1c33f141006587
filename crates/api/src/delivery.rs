//! Streaming a resolved artifact back to the caller.
//!
//! The file is read in chunks with [`ReaderStream`] and wrapped in an
//! [`ArtifactStream`] that schedules the artifact's deletion exactly once,
//! whichever way the body ends: fully sent, failed mid-stream, or dropped
//! because the client went away.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::Response;
use futures::Stream;
use mufy_core::cleanup::CleanupScheduler;
use mufy_core::outcome::{Artifact, TerminalOutcome};
use mufy_core::request::content_type_for_format;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};

/// Build the streaming response for a completed conversion.
///
/// `requested_type` is used when the artifact's extension maps to no known
/// audio type. Failing to open the file is the last point where an error
/// envelope can still be sent.
pub async fn stream_artifact(
    artifact: Artifact,
    requested_type: &'static str,
    cleanup: &CleanupScheduler,
) -> AppResult<Response> {
    let file = match File::open(&artifact.path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(error = %e, path = %artifact.path.display(), "Stream error");
            cleanup.schedule(artifact.path);
            return Err(AppError::Conversion(TerminalOutcome::StreamFailed(
                e.to_string(),
            )));
        }
    };

    let content_type = artifact_content_type(&artifact, requested_type);
    tracing::info!(
        file_name = %artifact.file_name,
        size_bytes = artifact.size_bytes,
        content_type,
        "Streaming artifact"
    );

    let body = ArtifactStream::new(
        ReaderStream::new(file),
        artifact.path.clone(),
        cleanup.clone(),
    );

    Response::builder()
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, content_disposition(&artifact.file_name))
        .header(CONTENT_LENGTH, artifact.size_bytes.to_string())
        .body(Body::from_stream(body))
        // The dropped body schedules the cleanup.
        .map_err(|e| AppError::InternalError(format!("Failed to build response: {e}")))
}

/// The extractor picks the container, so the artifact's extension is the
/// better hint; the requested format covers unknown extensions.
fn artifact_content_type(artifact: &Artifact, requested_type: &'static str) -> &'static str {
    artifact
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(content_type_for_format)
        .filter(|t| *t != "application/octet-stream")
        .unwrap_or(requested_type)
}

/// `attachment; filename="<name>"` with quotes, backslashes and control
/// characters replaced.
pub fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() || !c.is_ascii() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// Body stream that owns the artifact's cleanup.
pub struct ArtifactStream {
    inner: ReaderStream<File>,
    path: PathBuf,
    cleanup: CleanupScheduler,
    sent_bytes: u64,
    finished: bool,
}

impl ArtifactStream {
    pub fn new(inner: ReaderStream<File>, path: PathBuf, cleanup: CleanupScheduler) -> Self {
        Self {
            inner,
            path,
            cleanup,
            sent_bytes: 0,
            finished: false,
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.cleanup.schedule(self.path.clone());
    }
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent_bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                // Headers are out; the client sees a truncated body.
                tracing::error!(
                    error = %e,
                    path = %this.path.display(),
                    sent_bytes = this.sent_bytes,
                    "Stream error"
                );
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                tracing::info!(
                    path = %this.path.display(),
                    sent_bytes = this.sent_bytes,
                    "File streamed successfully"
                );
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ArtifactStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                path = %self.path.display(),
                sent_bytes = self.sent_bytes,
                "Client went away before the file was fully sent"
            );
            self.finish();
        }
    }
}
