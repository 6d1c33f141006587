//! Conversion orchestration core for the mufy audio service.
//!
//! Everything here is free of HTTP types: a [`request::ConversionRequest`]
//! goes in, exactly one [`outcome::TerminalOutcome`] comes out, and the
//! artifact on disk is reclaimed by [`cleanup`] once it has been delivered.

pub mod cleanup;
pub mod error;
pub mod excerpt;
pub mod extractor;
pub mod guard;
pub mod job;
pub mod orchestrator;
pub mod outcome;
pub mod request;
pub mod resolver;
pub mod workdir;
