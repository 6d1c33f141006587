//! Tests for `POST /api/download` (in-process strategy) against a local
//! source server.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, build_test_app, post_json, ScriptExtractor};

async fn serve_source() -> String {
    let app = Router::new()
        .route(
            "/media/clip.m4a",
            get(|| async { ([(header::CONTENT_TYPE, "audio/mp4")], vec![3u8; 300]) }),
        )
        .route(
            "/watch",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<html><body>player</body></html>",
                )
            }),
        )
        .route("/media/removed", get(|| async { StatusCode::NOT_FOUND }))
        .route("/media/private", get(|| async { StatusCode::FORBIDDEN }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn app() -> (tempfile::TempDir, Router) {
    let tmp = tempfile::tempdir().unwrap();
    let app = build_test_app(tmp.path(), ScriptExtractor::new("exit 0"), Duration::from_secs(5)).await;
    (tmp, app)
}

#[tokio::test]
async fn fetched_audio_is_returned_as_base64() {
    let base = serve_source().await;
    let (_tmp, app) = app().await;

    let response = post_json(
        app,
        "/api/download",
        json!({ "videoUrl": format!("{base}/media/clip.m4a"), "quality": "128K" }),
    )
    .await;
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["format"], "m4a");
    assert_eq!(json["size"], 300);
    assert_eq!(json["title"], "clip");
    let audio = BASE64.decode(json["audio"].as_str().unwrap()).unwrap();
    assert_eq!(audio, vec![3u8; 300]);
}

#[tokio::test]
async fn missing_video_url_is_400() {
    let (_tmp, app) = app().await;

    let (status, json) = body_json(post_json(app, "/api/download", json!({})).await).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "URL is required");
}

#[tokio::test]
async fn removed_source_is_404() {
    let base = serve_source().await;
    let (_tmp, app) = app().await;

    let response = post_json(
        app,
        "/api/download",
        json!({ "sourceReference": format!("{base}/media/removed") }),
    )
    .await;
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Video unavailable");
}

#[tokio::test]
async fn private_source_is_403() {
    let base = serve_source().await;
    let (_tmp, app) = app().await;

    let response = post_json(
        app,
        "/api/download",
        json!({ "videoUrl": format!("{base}/media/private") }),
    )
    .await;
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Private video");
}

#[tokio::test]
async fn html_page_is_not_a_successful_download() {
    let base = serve_source().await;
    let (_tmp, app) = app().await;

    let response = post_json(
        app,
        "/api/download",
        json!({ "videoUrl": format!("{base}/watch") }),
    )
    .await;
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "DOWNLOAD_FAILED");
    assert!(json.get("success").is_none());
}

#[tokio::test]
async fn empty_body_is_400_envelope() {
    let (_tmp, app) = app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Invalid request body");
    assert!(json["details"].is_string());
}

#[tokio::test]
async fn malformed_json_is_400_envelope() {
    let (_tmp, app) = app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .header("content-type", "application/json")
                .body(Body::from("{\"videoUrl\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, json) = body_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}
