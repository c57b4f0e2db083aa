use serde::{Deserialize, Serialize};

use crate::dao::models::RoomEntity;

pub const ROOM_PREFIX: &str = "room::";

/// Room blob wrapped in a CouchDB document envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub room: RoomEntity,
}

impl CouchRoomDocument {
    pub fn from_entity(room: RoomEntity) -> Self {
        Self {
            id: room_doc_id(&room.id),
            rev: None,
            room,
        }
    }

    pub fn into_entity(self) -> RoomEntity {
        self.room
    }
}

pub fn room_doc_id(id: &str) -> String {
    format!("{ROOM_PREFIX}{id}")
}
