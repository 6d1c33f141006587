//! In-process strategy: download into memory, answer with base64 JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mufy_core::request::ConversionRequest;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body of `POST /api/download`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDownloadRequest {
    #[serde(alias = "sourceReference")]
    pub video_url: Option<String>,
    #[serde(alias = "desiredQuality")]
    pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchDownloadResponse {
    pub success: bool,
    /// Base64 (standard alphabet, padded) audio bytes.
    pub audio: String,
    pub format: String,
    /// Decoded size in bytes.
    pub size: usize,
    pub title: String,
}

/// POST /api/download
///
/// A missing or malformed JSON body answers 400 in the error envelope.
pub async fn fetch_download(
    State(state): State<AppState>,
    payload: Result<Json<FetchDownloadRequest>, JsonRejection>,
) -> AppResult<Json<FetchDownloadResponse>> {
    let Json(body) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let request = ConversionRequest::new(
        body.video_url.as_deref().unwrap_or_default(),
        None,
        body.quality.as_deref(),
    )?;

    let fetched = state.fetcher.fetch(&request).await?;

    Ok(Json(FetchDownloadResponse {
        success: true,
        audio: BASE64.encode(&fetched.bytes),
        size: fetched.size(),
        format: fetched.format,
        title: fetched.title,
    }))
}
