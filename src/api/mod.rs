//! HTTP API
//!
//! Axum router, request handlers, and the health/status surface.

pub mod handlers;
pub mod server;
