//! Library crate for hint-quiz-back, exposing modules for binaries and integration tests.

/// Environment-driven configuration.
pub mod config;
/// Persistence: models, person catalog and room stores.
pub mod dao;
/// Wire types for REST, WebSocket and SSE.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum route trees.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared state and the per-room coordinators.
pub mod state;
