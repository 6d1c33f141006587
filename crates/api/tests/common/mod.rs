#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio::process::Command;
use tower::ServiceExt;

use mufy_api::config::{ConversionConfig, JanitorConfig, ServerConfig};
use mufy_api::router::build_app_router;
use mufy_api::state::AppState;
use mufy_core::cleanup::CleanupScheduler;
use mufy_core::extractor::AudioExtractor;
use mufy_core::job::JobToken;
use mufy_core::orchestrator::Orchestrator;
use mufy_core::request::ConversionRequest;
use mufy_core::resolver::PrefixResolver;
use mufy_core::workdir::WorkDir;
use mufy_fetch::{AudioFetcher, FetchConfig};

/// Cleanup delay used by test apps, short enough to poll for.
pub const TEST_CLEANUP_DELAY: Duration = Duration::from_millis(50);

/// Build a test `ServerConfig` with safe defaults rooted at `work_dir`.
pub fn test_config(work_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8081".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        conversion: ConversionConfig {
            work_dir: work_dir.to_path_buf(),
            settle_delay: Duration::ZERO,
            cleanup_delay: TEST_CLEANUP_DELAY,
            ..ConversionConfig::default()
        },
        janitor: JanitorConfig::default(),
        fetch: FetchConfig {
            timeout: Duration::from_secs(5),
            ..FetchConfig::default()
        },
    }
}

/// Stand-in extractor: `sh -c <script>` with `OUT_STEM` set to the job's
/// output path without extension. Counts launches.
pub struct ScriptExtractor {
    script: String,
    launches: AtomicUsize,
}

impl ScriptExtractor {
    pub fn new(script: &str) -> Arc<Self> {
        Arc::new(Self {
            script: script.to_string(),
            launches: AtomicUsize::new(0),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl AudioExtractor for ScriptExtractor {
    fn name(&self) -> &str {
        "script"
    }

    fn command(&self, _request: &ConversionRequest, job: &JobToken) -> Command {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.script)
            .env("OUT_STEM", job.work_dir().join(job.stem()));
        cmd
    }
}

/// Build the full application router around `extractor`.
///
/// Uses [`build_app_router`] so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub async fn build_test_app(
    work_dir: &Path,
    extractor: Arc<dyn AudioExtractor>,
    process_timeout: Duration,
) -> Router {
    let config = test_config(work_dir);

    let orchestrator = Orchestrator::new(
        WorkDir::ensure(work_dir).await.expect("work dir"),
        extractor,
        Arc::new(PrefixResolver::new(config.conversion.settle_delay)),
        process_timeout,
    );

    let state = AppState {
        fetcher: Arc::new(AudioFetcher::new(config.fetch.clone()).expect("http client")),
        cleanup: CleanupScheduler::new(config.conversion.cleanup_delay),
        orchestrator: Arc::new(orchestrator),
        config: Arc::new(config.clone()),
    };

    build_app_router(state, &config)
}

/// Percent-encode a source URL for use in a query string.
pub fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

pub fn download_uri(source: &str) -> String {
    format!("/api/download?url={}", encode_query_value(source))
}

/// Send a GET request and return the raw response.
pub async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a POST request with a JSON body and return the raw response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

/// File names currently in `dir`.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Poll until `dir` is empty, failing after two seconds.
pub async fn wait_until_empty(dir: &Path) {
    for _ in 0..100 {
        if dir_entries(dir).is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("work dir never emptied: {:?}", dir_entries(dir));
}
