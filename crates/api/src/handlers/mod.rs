//! Request handlers, one module per delivery strategy.

pub mod download;
pub mod fetch;
