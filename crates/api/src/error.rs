use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mufy_core::error::CoreError;
use mufy_core::excerpt::{excerpt, DETAILS_MAX_CHARS};
use mufy_core::outcome::TerminalOutcome;
use mufy_fetch::FetchError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors, failed conversion outcomes and
/// in-process fetch failures. Implements [`IntoResponse`] to produce the
/// `{ "error", "details", "code" }` JSON envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `mufy_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A conversion that ended in anything but `Completed`.
    #[error("{}", .0.category())]
    Conversion(TerminalOutcome),

    /// A failure of the in-process download strategy.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
                }
                CoreError::Io(err) => {
                    tracing::error!(error = %err, "Core I/O error");
                    internal()
                }
            },

            // --- Conversion outcomes ---
            AppError::Conversion(outcome) => classify_outcome(outcome),

            // --- In-process strategy ---
            AppError::Fetch(err) => classify_fetch_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "Invalid request body".to_string(),
                Some(msg.clone()),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = match details {
            Some(details) => json!({
                "error": message,
                "details": excerpt(&details, DETAILS_MAX_CHARS),
                "code": code,
            }),
            None => json!({
                "error": message,
                "code": code,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}

type Classified = (StatusCode, &'static str, String, Option<String>);

fn internal() -> Classified {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
        None,
    )
}

/// Every failed conversion is a 500; the category tells the client why.
fn classify_outcome(outcome: &TerminalOutcome) -> Classified {
    let code = match outcome {
        TerminalOutcome::TimedOut { .. } => "CONVERSION_TIMEOUT",
        TerminalOutcome::ProcessLaunchFailed(_) => "LAUNCH_FAILED",
        TerminalOutcome::ProcessExitedNonZero { .. } => "CONVERSION_FAILED",
        TerminalOutcome::ArtifactMissing => "ARTIFACT_MISSING",
        TerminalOutcome::ArtifactEmpty(_) => "ARTIFACT_EMPTY",
        TerminalOutcome::StreamFailed(_) => "STREAM_FAILED",
        TerminalOutcome::Cancelled => "CONVERSION_CANCELLED",
        TerminalOutcome::Completed(_) => {
            tracing::error!("Completed outcome rendered as an error");
            return internal();
        }
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        code,
        outcome.category().to_string(),
        Some(outcome.details()),
    )
}

fn classify_fetch_error(err: &FetchError) -> Classified {
    match err {
        FetchError::Unavailable => (
            StatusCode::NOT_FOUND,
            "SOURCE_UNAVAILABLE",
            "Video unavailable".to_string(),
            Some("This video is not available or has been removed".to_string()),
        ),
        FetchError::Restricted => (
            StatusCode::FORBIDDEN,
            "SOURCE_RESTRICTED",
            "Private video".to_string(),
            Some("This video is private and cannot be downloaded".to_string()),
        ),
        other => {
            tracing::error!(error = %other, "In-process download failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DOWNLOAD_FAILED",
                "Failed to download audio".to_string(),
                Some(other.to_string()),
            )
        }
    }
}
