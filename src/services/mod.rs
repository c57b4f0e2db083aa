/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room creation, initialization and state lookups.
pub mod room_service;
/// Server-Sent Events streaming for room spectators.
pub mod sse_service;
/// Room store connection and health supervision.
pub mod storage_supervisor;
/// WebSocket connection handling for room members.
pub mod websocket_service;
