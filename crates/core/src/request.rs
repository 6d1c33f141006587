//! Normalized conversion requests.
//!
//! Both delivery strategies (external extractor and in-process fetch) accept
//! a [`ConversionRequest`]; the HTTP layer only maps its query/body fields
//! onto [`ConversionRequest::new`].

use crate::error::CoreError;

/// Audio container used when the caller does not ask for one.
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";

/// Extractor audio quality used when the caller does not ask for one.
pub const DEFAULT_AUDIO_QUALITY: &str = "192K";

/// An accepted conversion request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    source_reference: String,
    desired_format: String,
    desired_quality: String,
}

impl ConversionRequest {
    /// Validate and normalize a request.
    ///
    /// Blank format/quality fall back to [`DEFAULT_AUDIO_FORMAT`] and
    /// [`DEFAULT_AUDIO_QUALITY`]. The format is otherwise passed through to
    /// the extractor untouched.
    pub fn new(
        source_reference: &str,
        desired_format: Option<&str>,
        desired_quality: Option<&str>,
    ) -> Result<Self, CoreError> {
        let source_reference = source_reference.trim();
        validate_source_reference(source_reference)?;

        let desired_format = non_blank(desired_format).unwrap_or(DEFAULT_AUDIO_FORMAT);
        validate_format(desired_format)?;

        let desired_quality = non_blank(desired_quality).unwrap_or(DEFAULT_AUDIO_QUALITY);

        Ok(Self {
            source_reference: source_reference.to_string(),
            desired_format: desired_format.to_lowercase(),
            desired_quality: desired_quality.to_string(),
        })
    }

    pub fn source_reference(&self) -> &str {
        &self.source_reference
    }

    pub fn desired_format(&self) -> &str {
        &self.desired_format
    }

    pub fn desired_quality(&self) -> &str {
        &self.desired_quality
    }

    /// Media type announced when the artifact is streamed back.
    pub fn content_type(&self) -> &'static str {
        content_type_for_format(&self.desired_format)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate that a source reference is non-empty and looks like an http(s) URL.
pub fn validate_source_reference(url: &str) -> Result<(), CoreError> {
    if url.is_empty() {
        return Err(CoreError::Validation("URL is required".to_string()));
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "URL must start with http:// or https://, got: '{url}'"
            ))
        })?;
    if rest.is_empty() || rest.starts_with('/') || rest.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!("Invalid media URL: '{url}'")));
    }
    Ok(())
}

/// The format ends up in a file name inside the work dir, so path
/// separators and relative components are refused.
fn validate_format(format: &str) -> Result<(), CoreError> {
    if format.contains(&['/', '\\'][..]) || format.contains("..") {
        return Err(CoreError::Validation(format!(
            "Invalid audio format: '{format}'"
        )));
    }
    Ok(())
}

/// Map an audio container name to its media type.
pub fn content_type_for_format(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "opus" | "ogg" | "vorbis" => "audio/ogg",
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
