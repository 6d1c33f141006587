//! Tests for `AppError` → HTTP response mapping.
//!
//! These tests verify that each `AppError` variant produces the correct HTTP
//! status code, error code, and message. They do NOT need an HTTP server --
//! they call `IntoResponse` directly on `AppError` values.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use mufy_api::error::AppError;
use mufy_core::error::CoreError;
use mufy_core::outcome::TerminalOutcome;
use mufy_fetch::FetchError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: validation errors map to 400 with the message as `error`
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("URL is required".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "URL is required");
    assert!(json.get("details").is_none());
}

// ---------------------------------------------------------------------------
// Test: each failed outcome is a 500 carrying its category
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_outcomes_return_500_with_category() {
    let cases = [
        (
            TerminalOutcome::TimedOut {
                after: Duration::from_secs(600),
            },
            "Conversion timeout",
            "CONVERSION_TIMEOUT",
        ),
        (
            TerminalOutcome::ProcessLaunchFailed("No such file or directory".into()),
            "Failed to start conversion process",
            "LAUNCH_FAILED",
        ),
        (
            TerminalOutcome::ProcessExitedNonZero {
                exit_code: Some(1),
                stderr_excerpt: "ERROR: boom".into(),
            },
            "Conversion failed",
            "CONVERSION_FAILED",
        ),
        (
            TerminalOutcome::ArtifactMissing,
            "File not found after conversion",
            "ARTIFACT_MISSING",
        ),
        (
            TerminalOutcome::ArtifactEmpty(PathBuf::from("temp/audio_1.mp3")),
            "Empty file generated",
            "ARTIFACT_EMPTY",
        ),
        (
            TerminalOutcome::StreamFailed("permission denied".into()),
            "Error reading file",
            "STREAM_FAILED",
        ),
    ];

    for (outcome, category, code) in cases {
        let (status, json) = error_to_response(AppError::Conversion(outcome)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], category);
        assert_eq!(json["code"], code);
        assert!(json["details"].is_string());
    }
}

// ---------------------------------------------------------------------------
// Test: details are bounded to 500 characters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn long_details_are_truncated() {
    let err = AppError::Conversion(TerminalOutcome::StreamFailed("x".repeat(5_000)));

    let (_, json) = error_to_response(err).await;

    let details = json["details"].as_str().unwrap();
    assert!(details.chars().count() <= 501);
    assert!(details.ends_with('…'));
}

// ---------------------------------------------------------------------------
// Test: fetch errors map to 404 / 403 / 500
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_errors_are_classified() {
    let (status, json) = error_to_response(AppError::Fetch(FetchError::Unavailable)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Video unavailable");

    let (status, json) = error_to_response(AppError::Fetch(FetchError::Restricted)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Private video");

    let (status, json) =
        error_to_response(AppError::Fetch(FetchError::TooLarge { limit: 10 })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "DOWNLOAD_FAILED");
}

// ---------------------------------------------------------------------------
// Test: unreadable bodies map to 400 with the rejection as details
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_request_error_returns_400_envelope() {
    let err = AppError::BadRequest("EOF while parsing a value".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Invalid request body");
    assert_eq!(json["details"], "EOF while parsing a value");
}

// ---------------------------------------------------------------------------
// Test: a document served instead of audio is a failed download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_audio_source_returns_500() {
    let err = AppError::Fetch(FetchError::NotAudio {
        content_type: "text/html".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "DOWNLOAD_FAILED");
    assert!(json["details"].as_str().unwrap().contains("text/html"));
}

// ---------------------------------------------------------------------------
// Test: internal errors never leak their message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_is_sanitized() {
    let err = AppError::InternalError("secret path /etc/x".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
