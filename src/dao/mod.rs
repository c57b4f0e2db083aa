/// Database model definitions.
pub mod models;
/// Read-only person records consumed by room coordinators.
pub mod persons;
/// Durable storage for room state blobs.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
