pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /download      GET   convert with the extractor, stream the audio file
///                POST  download in-process, return base64 JSON
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().route(
        "/download",
        get(handlers::download::download).post(handlers::fetch::fetch_download),
    )
}
