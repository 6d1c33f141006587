//! HTTP download of a source into memory.

use std::time::Duration;

use futures::StreamExt;
use mufy_core::request::ConversionRequest;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

use crate::error::FetchError;

/// Default in-memory cap: 100 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Default whole-request timeout: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Container reported when the source gives no usable hint.
pub const FALLBACK_FORMAT: &str = "m4a";

/// Title reported when the source gives no usable hint.
const FALLBACK_TITLE: &str = "audio";

/// Settings for [`AudioFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Largest body buffered before giving up with [`FetchError::TooLarge`].
    pub max_bytes: u64,
    /// Timeout for the whole download, body included.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("mufy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A fully buffered download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    /// Container name (`m4a`, `mp3`, ...), derived from the response.
    pub format: String,
    pub title: String,
}

impl FetchedAudio {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Downloads sources with a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl AudioFetcher {
    /// Build a fetcher with its own HTTP client.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    /// Download the request's source and buffer it fully.
    pub async fn fetch(&self, request: &ConversionRequest) -> Result<FetchedAudio, FetchError> {
        let source = request.source_reference();
        tracing::info!(
            source,
            quality = request.desired_quality(),
            "Fetching audio in-process"
        );

        let response = self.client.get(source).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(source, status = status.as_u16(), "Source refused download");
            return Err(FetchError::from_status(status));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let disposition = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_segment = response
            .url()
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let file_name = disposition
            .as_deref()
            .and_then(disposition_file_name)
            .or(last_segment);
        let extension_hint = file_name.as_deref().and_then(extension_of);

        if let Some(content_type) = content_type.as_deref() {
            if is_document_type(content_type) && extension_hint.is_none() {
                tracing::warn!(source, content_type, "Source is a document, not audio");
                return Err(FetchError::NotAudio {
                    content_type: content_type.to_string(),
                });
            }
        }

        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }

        let format = content_type
            .as_deref()
            .and_then(format_from_content_type)
            .or(extension_hint)
            .unwrap_or(FALLBACK_FORMAT)
            .to_string();
        let title = file_name
            .as_deref()
            .map(strip_extension)
            .filter(|t| !t.is_empty())
            .unwrap_or(FALLBACK_TITLE)
            .to_string();

        tracing::info!(source, size_bytes = bytes.len(), %format, %title, "Fetched audio");

        Ok(FetchedAudio {
            bytes,
            format,
            title,
        })
    }
}

/// Map an audio media type onto a container name.
pub fn format_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let format = match essence.as_str() {
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/aac" => "aac",
        "audio/webm" => "webm",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => return None,
    };
    Some(format)
}

/// Media types that describe a page or an API answer rather than media.
fn is_document_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/")
        || matches!(
            essence.as_str(),
            "application/json"
                | "application/xml"
                | "application/xhtml+xml"
                | "application/javascript"
        )
}

/// `attachment; filename="x.m4a"` → `x.m4a`.
fn disposition_file_name(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|part| {
        let value = part.trim().strip_prefix("filename=")?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn extension_of(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    format_from_content_type(&format!("audio/{ext}"))
}

fn strip_extension(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
}
