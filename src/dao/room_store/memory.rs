use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{models::RoomEntity, room_store::RoomStore, storage::StorageResult};

/// Process-local room store; state survives coordinator restarts but not process restarts.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<DashMap<String, RoomEntity>>,
}

impl MemoryRoomStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryRoomStore {
    fn load_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let found = self.rooms.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.rooms.insert(room.id.clone(), room);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
