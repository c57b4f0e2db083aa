/// Health check payloads.
pub mod health;
/// Room REST payloads and snapshots.
pub mod room;
/// Spectator stream events.
pub mod sse;
/// Validation helpers for DTOs.
pub mod validation;
/// WebSocket message envelopes.
pub mod ws;
