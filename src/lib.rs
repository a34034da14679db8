//! Library crate for estimate-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Snapshot persistence.
pub mod dao;
/// Wire types exchanged with clients.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// HTTP server lifecycle.
pub mod server;
/// Business logic behind the routes.
pub mod services;
/// In-memory rooms and shared application state.
pub mod state;
