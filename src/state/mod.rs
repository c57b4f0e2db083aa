/// Open sockets of a room and their bound players.
pub mod connections;
/// Per-room actor and the handle used to reach it.
pub mod coordinator;
/// Room aggregate and its mutations.
pub mod room;
/// Hint reveal and round deadline timing.
pub mod scheduler;
/// Points and answer matching.
pub mod scoring;
mod sse;
/// Round lifecycle transitions.
pub mod state_machine;

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{RwLock, mpsc, watch};

use crate::{
    config::AppConfig,
    dao::{persons::PersonSource, room_store::RoomStore},
};

pub use self::coordinator::RoomHandle;
use self::coordinator::RoomCommand;
pub use self::sse::SseHub;

/// Reference-counted application state shared by handlers and coordinators.
pub type SharedState = Arc<AppState>;

/// Source of wall-clock time, in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// [`Clock`] reading the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or_default()
    }
}

/// Central application state: storage handle, person source and the room registry.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    persons: Arc<dyn PersonSource>,
    rooms: DashMap<String, RoomHandle>,
    config: AppConfig,
    clock: Arc<dyn Clock>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, persons: Arc<dyn PersonSource>) -> SharedState {
        Self::with_clock(config, persons, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with a custom time source.
    pub fn with_clock(
        config: AppConfig,
        persons: Arc<dyn PersonSource>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            persons,
            rooms: DashMap::new(),
            config,
            clock,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Whether storage is missing or flagged unhealthy.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.room_store.read().await;
        guard.is_none() || *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Person source rooms draw from.
    pub fn persons(&self) -> Arc<dyn PersonSource> {
        Arc::clone(&self.persons)
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current wall-clock time in epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Handle of the coordinator owning `room_id`, spawning it on first access
    /// or when the previous one retired.
    pub fn room(self: &Arc<Self>, room_id: &str) -> RoomHandle {
        let mut handle = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomHandle::spawn(room_id.to_string(), Arc::clone(self)));
        if handle.is_closed() {
            *handle = RoomHandle::spawn(room_id.to_string(), Arc::clone(self));
        }
        handle.clone()
    }

    /// Close `commands` and unregister the room unless a command is pending.
    ///
    /// Runs under the registry entry lock, so no new handle is handed out meanwhile.
    pub(crate) fn retire_room(
        &self,
        room_id: &str,
        commands: &mut mpsc::Receiver<RoomCommand>,
    ) -> bool {
        let entry = self.rooms.entry(room_id.to_string());
        if !commands.is_empty() {
            return false;
        }
        commands.close();
        if let Entry::Occupied(entry) = entry {
            if entry.get().is_closed() {
                entry.remove();
            }
        }
        true
    }

    /// Number of coordinators currently registered.
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}
