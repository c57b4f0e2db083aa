use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoRoomDocument, doc_id},
};
use crate::dao::{models::RoomEntity, room_store::RoomStore, storage::StorageResult};

const ROOM_COLLECTION_NAME: &str = "rooms";

/// [`RoomStore`] backed by the `rooms` collection, reconnecting on demand.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn find_room(&self, id: String) -> MongoResult<Option<RoomEntity>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn upsert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let id = room.id.clone();
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;
        collection
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(())
    }
}

impl RoomStore for MongoRoomStore {
    fn load_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_room(room).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.reconnect().await.map_err(Into::into) })
    }
}
