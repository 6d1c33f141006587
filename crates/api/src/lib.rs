//! mufy API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! delivery, background tasks) so integration tests and the binary
//! entrypoint share them.

pub mod background;
pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
