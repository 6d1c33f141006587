use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mufy_core::cleanup::DEFAULT_CLEANUP_DELAY;
use mufy_core::extractor::DEFAULT_YTDLP_PROGRAM;
use mufy_core::orchestrator::DEFAULT_PROCESS_TIMEOUT;
use mufy_core::resolver::DEFAULT_SETTLE_DELAY;
use mufy_fetch::fetcher::{DEFAULT_MAX_BYTES, DEFAULT_TIMEOUT};
use mufy_fetch::FetchConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Outer HTTP request timeout in seconds (default: `900`).
    ///
    /// Must stay above the process timeout so the supervisory timer, not this
    /// layer, produces the `Conversion timeout` response.
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Extractor and artifact lifecycle settings.
    pub conversion: ConversionConfig,
    /// Stale artifact sweeping.
    pub janitor: JanitorConfig,
    /// In-process download strategy.
    pub fetch: FetchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:8081`    |
    /// | `REQUEST_TIMEOUT_SECS` | `900`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `FETCH_MAX_BYTES`      | `104857600`                |
    /// | `FETCH_TIMEOUT_SECS`   | `300`                      |
    ///
    /// See [`ConversionConfig::from_env`] and [`JanitorConfig::from_env`] for
    /// the remaining variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8081".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 900);
        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", 30);

        let fetch = FetchConfig {
            max_bytes: env_or("FETCH_MAX_BYTES", DEFAULT_MAX_BYTES),
            timeout: Duration::from_secs(env_or("FETCH_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())),
            ..FetchConfig::default()
        };

        let conversion = ConversionConfig::from_env();
        check_timeout_order(request_timeout_secs, conversion.process_timeout);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            conversion,
            janitor: JanitorConfig::from_env(),
            fetch,
        }
    }
}

/// Settings for the process-based conversion strategy.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Scratch directory for extractor output.
    pub work_dir: PathBuf,
    /// Extractor program, resolved through `PATH` unless absolute.
    pub ytdlp_bin: PathBuf,
    /// Supervisory timeout for one extractor run.
    pub process_timeout: Duration,
    /// Wait between a clean exit and the artifact lookup.
    pub settle_delay: Duration,
    /// Wait between the end of delivery and artifact deletion.
    pub cleanup_delay: Duration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("temp"),
            ytdlp_bin: PathBuf::from(DEFAULT_YTDLP_PROGRAM),
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
        }
    }
}

impl ConversionConfig {
    /// | Env Var                | Default   |
    /// |------------------------|-----------|
    /// | `WORK_DIR`             | `temp`    |
    /// | `YTDLP_BIN`            | `yt-dlp`  |
    /// | `PROCESS_TIMEOUT_SECS` | `600`     |
    /// | `SETTLE_DELAY_MS`      | `1000`    |
    /// | `CLEANUP_DELAY_SECS`   | `5`       |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);
        let ytdlp_bin = std::env::var("YTDLP_BIN")
            .map(PathBuf::from)
            .unwrap_or(defaults.ytdlp_bin);

        Self {
            work_dir,
            ytdlp_bin,
            process_timeout: Duration::from_secs(env_or(
                "PROCESS_TIMEOUT_SECS",
                defaults.process_timeout.as_secs(),
            )),
            settle_delay: Duration::from_millis(env_or(
                "SETTLE_DELAY_MS",
                defaults.settle_delay.as_millis() as u64,
            )),
            cleanup_delay: Duration::from_secs(env_or(
                "CLEANUP_DELAY_SECS",
                defaults.cleanup_delay.as_secs(),
            )),
        }
    }
}

/// Settings for the background work dir janitor.
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    pub interval: Duration,
    /// Artifacts untouched for longer than this are removed.
    pub max_age: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            max_age: Duration::from_secs(3600),
        }
    }
}

impl JanitorConfig {
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `JANITOR_INTERVAL_SECS` | `600`   |
    /// | `JANITOR_MAX_AGE_SECS`  | `3600`  |
    ///
    /// The interval must be non-zero.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: Duration::from_secs(non_zero(
                "JANITOR_INTERVAL_SECS",
                env_or("JANITOR_INTERVAL_SECS", defaults.interval.as_secs()),
            )),
            max_age: Duration::from_secs(env_or(
                "JANITOR_MAX_AGE_SECS",
                defaults.max_age.as_secs(),
            )),
        }
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
///
/// Panics on a value that does not parse: misconfiguration fails at startup.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

fn non_zero(name: &str, value: u64) -> u64 {
    if value == 0 {
        panic!("{name} must be greater than 0");
    }
    value
}

/// The outer request timeout has to outlast the supervisory timer, otherwise
/// slow conversions surface as a bare 408 instead of `Conversion timeout`.
fn check_timeout_order(request_timeout_secs: u64, process_timeout: Duration) {
    if Duration::from_secs(request_timeout_secs) <= process_timeout {
        panic!(
            "REQUEST_TIMEOUT_SECS ({request_timeout_secs}) must exceed PROCESS_TIMEOUT_SECS ({})",
            process_timeout.as_secs()
        );
    }
}
