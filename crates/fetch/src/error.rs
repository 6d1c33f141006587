/// Errors from the in-process fetch strategy.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source does not exist (any more).
    #[error("Video unavailable")]
    Unavailable,

    /// The source exists but refuses anonymous access.
    #[error("Private video")]
    Restricted,

    /// The source answered with a success status but no bytes.
    #[error("Source returned an empty body")]
    Empty,

    /// The source answered with a page or document instead of media.
    #[error("Source returned {content_type}, not audio")]
    NotAudio { content_type: String },

    /// The body would exceed the in-memory buffer cap.
    #[error("Source exceeds the {limit} byte download limit")]
    TooLarge { limit: u64 },

    /// Any other non-2xx status from the source.
    #[error("Source returned HTTP {status}")]
    Upstream { status: u16 },

    /// Network, DNS, TLS or timeout failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Map a non-success status onto the error the caller should see.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            404 | 410 => Self::Unavailable,
            401 | 403 | 451 => Self::Restricted,
            other => Self::Upstream { status: other },
        }
    }
}
