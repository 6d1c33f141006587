use std::sync::Arc;

use mufy_core::cleanup::CleanupScheduler;
use mufy_core::error::CoreError;
use mufy_core::extractor::YtDlpExtractor;
use mufy_core::orchestrator::Orchestrator;
use mufy_core::resolver::PrefixResolver;
use mufy_core::workdir::WorkDir;
use mufy_fetch::{AudioFetcher, FetchError};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Process-based conversion strategy.
    pub orchestrator: Arc<Orchestrator>,
    /// In-process download strategy.
    pub fetcher: Arc<AudioFetcher>,
    /// Deferred deletion of delivered artifacts.
    pub cleanup: CleanupScheduler,
}

/// Errors raised while assembling [`AppState`] at startup.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Work dir unavailable: {0}")]
    WorkDir(#[from] CoreError),

    #[error("HTTP client unavailable: {0}")]
    Fetcher(#[from] FetchError),
}

impl AppState {
    /// Build the production state: yt-dlp extractor, prefix resolver and the
    /// configured work dir (created if missing).
    pub async fn from_config(config: ServerConfig) -> Result<Self, StateError> {
        let conversion = &config.conversion;
        let work_dir = WorkDir::ensure(&conversion.work_dir).await?;

        let orchestrator = Orchestrator::new(
            work_dir,
            Arc::new(YtDlpExtractor::new(&conversion.ytdlp_bin)),
            Arc::new(PrefixResolver::new(conversion.settle_delay)),
            conversion.process_timeout,
        );
        let fetcher = AudioFetcher::new(config.fetch.clone())?;
        let cleanup = CleanupScheduler::new(conversion.cleanup_delay);

        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            fetcher: Arc::new(fetcher),
            cleanup,
        })
    }
}
