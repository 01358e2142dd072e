//! Library crate for typerace-party, exposing modules for binaries and integration tests.

pub mod config;
/// Data transfer objects shared by the HTTP and WebSocket layers.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared application state and the room registry.
pub mod state;
