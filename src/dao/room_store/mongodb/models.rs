use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::RoomEntity;

/// Room blob as stored in the `rooms` collection, keyed by the room id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: String,
    updated_at: DateTime,
    room: RoomEntity,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id.clone(),
            updated_at: DateTime::from_system_time(value.updated_at),
            room: value,
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        value.room
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}
