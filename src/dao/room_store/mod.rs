/// CouchDB-backed room store.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Process-local room store.
pub mod memory;
/// MongoDB-backed room store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::RoomEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use memory::MemoryRoomStore;

/// Durable key-value storage holding one state blob per room id.
pub trait RoomStore: Send + Sync {
    /// Fetch the blob stored under `id`, if any.
    fn load_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Insert or replace the blob of `room.id`.
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
