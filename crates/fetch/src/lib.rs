//! In-process fetch strategy.
//!
//! For hosts where spawning an extractor is not allowed: the source is
//! downloaded over HTTP with [`reqwest`] and buffered fully in memory (capped
//! by [`FetchConfig::max_bytes`]) before the caller encodes it into a JSON
//! envelope. The process-based strategy in `mufy-core` streams from disk and
//! does not carry this memory bound.

pub mod error;
pub mod fetcher;

pub use error::FetchError;
pub use fetcher::{AudioFetcher, FetchConfig, FetchedAudio};
