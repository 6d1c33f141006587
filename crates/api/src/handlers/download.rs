//! Process-based strategy: run the extractor, stream the artifact back.

use axum::extract::{Query, State};
use axum::response::Response;
use mufy_core::outcome::TerminalOutcome;
use mufy_core::request::ConversionRequest;
use serde::Deserialize;

use crate::delivery;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters for `GET /api/download`.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    #[serde(alias = "sourceReference")]
    pub url: Option<String>,
    #[serde(alias = "desiredFormat")]
    pub format: Option<String>,
    #[serde(alias = "desiredQuality")]
    pub quality: Option<String>,
}

/// GET /api/download?url=<source>&format=<container>
///
/// Validation failures answer 400 before anything is launched. Otherwise the
/// single terminal outcome of the conversion decides the response: a streamed
/// file on success, the error envelope on any failure.
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> AppResult<Response> {
    let request = ConversionRequest::new(
        params.url.as_deref().unwrap_or_default(),
        params.format.as_deref(),
        params.quality.as_deref(),
    )?;

    tracing::info!(
        source = request.source_reference(),
        format = request.desired_format(),
        "Conversion requested"
    );

    match state.orchestrator.run(&request).await {
        TerminalOutcome::Completed(artifact) => {
            delivery::stream_artifact(artifact, request.content_type(), &state.cleanup).await
        }
        outcome => Err(AppError::Conversion(outcome)),
    }
}
