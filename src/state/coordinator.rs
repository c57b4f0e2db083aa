//! Single-writer actor owning one room.
//!
//! Every trigger (init, state fetch, socket traffic, spectator subscription and
//! the hint timer) is funneled through one task, so a command runs to completion
//! (load, mutate, persist, broadcast) before the next one starts.

use std::{
    sync::{Arc, Weak},
    time::{Duration, SystemTime},
};

use axum::extract::ws::Message;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::RoomEntity,
    dto::{
        room::{GuessView, RoomSnapshot},
        sse::ServerEvent,
        ws::{JoinedPayload, RoomInbound, RoomOutbound},
    },
    error::ServiceError,
    state::{
        AppState, SharedState, SseHub,
        connections::ConnectionRegistry,
        room::{Person, Room},
        scheduler::WakeOutcome,
        state_machine::{RoomEvent, RoundStatus},
    },
};

const COMMAND_BUFFER: usize = 64;
/// How often a coordinator without a room re-checks whether it can retire.
const IDLE_RECHECK: Duration = Duration::from_secs(30);

/// Reply of a spectator subscription: the current snapshot, if any, and the live feed.
pub type Subscription = (Option<ServerEvent>, broadcast::Receiver<ServerEvent>);

/// Requests processed by a room coordinator, one at a time.
pub enum RoomCommand {
    /// Create the room unless it exists.
    Init {
        /// Host secret.
        host_key: String,
        /// Persons to draw.
        total_rounds: u32,
        /// Category code.
        category: String,
        /// Receives the room id.
        reply: oneshot::Sender<Result<String, ServiceError>>,
    },
    /// Fetch the current snapshot.
    Snapshot {
        /// Receives the snapshot, `None` for unknown rooms.
        reply: oneshot::Sender<Result<Option<RoomSnapshot>, ServiceError>>,
    },
    /// A socket opened.
    Connect {
        /// Socket id.
        connection_id: Uuid,
        /// Writer queue of the socket.
        tx: mpsc::UnboundedSender<Message>,
    },
    /// A parsed client message.
    Inbound {
        /// Sending socket.
        connection_id: Uuid,
        /// The message.
        message: RoomInbound,
    },
    /// A socket closed.
    Disconnect {
        /// Socket id.
        connection_id: Uuid,
    },
    /// A spectator attached.
    Subscribe {
        /// Receives the initial event and the feed.
        reply: oneshot::Sender<Subscription>,
    },
}

/// Cloneable address of a running room coordinator.
///
/// A coordinator without a room retires on its own; commands sent through a
/// stale handle are routed to the coordinator registered in its place.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: String,
    tx: mpsc::Sender<RoomCommand>,
    state: Weak<AppState>,
}

impl RoomHandle {
    /// Start the coordinator task for `room_id`.
    pub fn spawn(room_id: String, state: SharedState) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = Self {
            room_id: room_id.clone(),
            tx,
            state: Arc::downgrade(&state),
        };
        let coordinator = RoomCoordinator::new(room_id, state);
        tokio::spawn(coordinator.run(rx));
        handle
    }

    /// Whether the coordinator behind this handle has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Create the room unless it already exists; returns its id either way.
    pub async fn init(
        &self,
        host_key: String,
        total_rounds: u32,
        category: String,
    ) -> Result<String, ServiceError> {
        self.request(|reply| RoomCommand::Init {
            host_key,
            total_rounds,
            category,
            reply,
        })
        .await?
    }

    /// Current snapshot after applying an overdue timeout; `None` for unknown rooms.
    pub async fn snapshot(&self) -> Result<Option<RoomSnapshot>, ServiceError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await?
    }

    /// Register an open socket.
    pub async fn connect(
        &self,
        connection_id: Uuid,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Result<(), ServiceError> {
        self.send(RoomCommand::Connect { connection_id, tx }).await
    }

    /// Queue a parsed client message.
    pub async fn inbound(
        &self,
        connection_id: Uuid,
        message: RoomInbound,
    ) -> Result<(), ServiceError> {
        self.send(RoomCommand::Inbound {
            connection_id,
            message,
        })
        .await
    }

    /// Report a closed socket.
    pub async fn disconnect(&self, connection_id: Uuid) -> Result<(), ServiceError> {
        self.send(RoomCommand::Disconnect { connection_id }).await
    }

    /// Subscribe to the room's spectator feed.
    pub async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        self.request(|reply| RoomCommand::Subscribe { reply }).await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), ServiceError> {
        let Err(mpsc::error::SendError(command)) = self.tx.send(command).await else {
            return Ok(());
        };
        let Some(state) = self.state.upgrade() else {
            return Err(ServiceError::RoomUnavailable(self.room_id.clone()));
        };
        state.room(&self.room_id).forward(command).await
    }

    async fn forward(&self, command: RoomCommand) -> Result<(), ServiceError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ServiceError::RoomUnavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response
            .await
            .map_err(|_| ServiceError::RoomUnavailable(self.room_id.clone()))
    }
}

/// Actor state for one room.
pub struct RoomCoordinator {
    room_id: String,
    state: SharedState,
    room: Option<Room>,
    loaded: bool,
    connections: ConnectionRegistry,
    spectators: SseHub,
}

impl RoomCoordinator {
    fn new(room_id: String, state: SharedState) -> Self {
        Self {
            room_id,
            state,
            room: None,
            loaded: false,
            connections: ConnectionRegistry::default(),
            spectators: SseHub::default(),
        }
    }

    /// Process commands and timer wake-ups until every handle is dropped or the
    /// coordinator retires for lack of a room.
    pub async fn run(mut self, mut commands: mpsc::Receiver<RoomCommand>) {
        info!(room_id = %self.room_id, "room coordinator started");

        loop {
            let wake_at = self.room.as_ref().and_then(Room::next_wake_at);
            let delay = wake_at
                .map(|at| delay_until(at, self.state.now_ms()))
                .unwrap_or_default();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = tokio::time::sleep(delay), if wake_at.is_some() => self.on_timer().await,
                _ = tokio::time::sleep(IDLE_RECHECK), if self.room.is_none() => {}
            }

            if self.is_idle() && self.state.retire_room(&self.room_id, &mut commands) {
                self.hand_over(&mut commands).await;
                debug!(room_id = %self.room_id, "no such room; coordinator retired");
                break;
            }
        }

        info!(room_id = %self.room_id, "room coordinator stopped");
    }

    /// No room in memory and nobody attached.
    fn is_idle(&self) -> bool {
        self.room.is_none()
            && self.connections.is_empty()
            && !self.spectators.has_subscribers()
    }

    /// Pass commands queued before the channel closed to the successor.
    async fn hand_over(&self, commands: &mut mpsc::Receiver<RoomCommand>) {
        while let Ok(command) = commands.try_recv() {
            if let Err(err) = self.state.room(&self.room_id).forward(command).await {
                warn!(room_id = %self.room_id, error = %err, "failed to hand over command");
            }
        }
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Init {
                host_key,
                total_rounds,
                category,
                reply,
            } => {
                let result = self.init(host_key, total_rounds, category).await;
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let result = self.snapshot().await;
                let _ = reply.send(result);
            }
            RoomCommand::Connect { connection_id, tx } => {
                self.connections.insert(connection_id, tx);
                debug!(room_id = %self.room_id, %connection_id, open = self.connections.len(), "socket connected");
            }
            RoomCommand::Inbound {
                connection_id,
                message,
            } => self.on_message(connection_id, message).await,
            RoomCommand::Disconnect { connection_id } => self.on_close(connection_id).await,
            RoomCommand::Subscribe { reply } => {
                if let Err(err) = self.ensure_loaded().await {
                    warn!(room_id = %self.room_id, error = %err, "cannot load room for spectator");
                }
                let initial = self.room.as_ref().and_then(|room| {
                    ServerEvent::from_outbound(&RoomOutbound::RoomUpdate(room.into())).ok()
                });
                let _ = reply.send((initial, self.spectators.subscribe()));
            }
        }
    }

    /// Load the persisted room once. A failed load is retried on the next command.
    async fn ensure_loaded(&mut self) -> Result<(), ServiceError> {
        if self.loaded {
            return Ok(());
        }
        let store = self.state.room_store().await.ok_or(ServiceError::Degraded)?;
        let entity = store.load_room(self.room_id.clone()).await?;
        self.room = entity.map(Room::from);
        self.loaded = true;

        if let Some(room) = &self.room {
            info!(
                room_id = %self.room_id,
                status = ?room.status,
                players = room.players.len(),
                "room restored from storage"
            );
        }
        Ok(())
    }

    async fn init(
        &mut self,
        host_key: String,
        total_rounds: u32,
        category: String,
    ) -> Result<String, ServiceError> {
        self.ensure_loaded().await?;
        if let Some(room) = &self.room {
            debug!(room_id = %self.room_id, "room already initialized");
            return Ok(room.id.clone());
        }
        if self.state.is_degraded().await {
            return Err(ServiceError::Degraded);
        }

        let person_ids = self
            .state
            .persons()
            .random_person_ids(category.clone(), total_rounds as usize)
            .await?;
        if person_ids.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "no persons available for category `{category}`"
            )));
        }

        info!(
            room_id = %self.room_id,
            %category,
            total_rounds,
            drawn = person_ids.len(),
            "room created"
        );
        self.room = Some(Room::new(
            self.room_id.clone(),
            host_key,
            total_rounds,
            category,
            self.state.config().room_defaults(),
            person_ids,
        ));
        self.persist().await;
        Ok(self.room_id.clone())
    }

    async fn snapshot(&mut self) -> Result<Option<RoomSnapshot>, ServiceError> {
        self.ensure_loaded().await?;
        if self.reconcile() {
            self.commit(None).await;
        }
        Ok(self.room.as_ref().map(RoomSnapshot::from))
    }

    /// Apply an overdue round timeout.
    fn reconcile(&mut self) -> bool {
        let now = self.state.now_ms();
        let Some(room) = self.room.as_mut() else {
            return false;
        };
        let ended = room.reconcile_timeout(now);
        if ended {
            info!(room_id = %self.room_id, "round ended at its deadline");
        }
        ended
    }

    async fn on_message(&mut self, connection_id: Uuid, message: RoomInbound) {
        if let Err(err) = self.ensure_loaded().await {
            warn!(room_id = %self.room_id, error = %err, "dropping message; room cannot be loaded");
            return;
        }
        if self.room.is_none() {
            debug!(room_id = %self.room_id, kind = message.kind(), "dropping message for uninitialized room");
            return;
        }
        let timed_out = self.reconcile();

        if let RoomInbound::JoinRoom {
            name,
            host_key,
            player_id,
        } = message
        {
            self.join(connection_id, name, host_key, player_id).await;
            return;
        }

        let Some(player_id) = self.connections.player_of(&connection_id).map(str::to_owned) else {
            debug!(room_id = %self.room_id, %connection_id, kind = message.kind(), "dropping message from anonymous socket");
            if timed_out {
                self.commit(None).await;
            }
            return;
        };

        let mut guess = None;
        let changed = match message {
            RoomInbound::JoinRoom { .. } => false,
            RoomInbound::ToggleReady { ready } => self
                .room
                .as_mut()
                .is_some_and(|room| room.set_ready(&player_id, ready)),
            RoomInbound::StartGame => self.start_game(&player_id).await,
            RoomInbound::Guess { answer } => {
                guess = self.guess(&player_id, answer);
                guess.is_some()
            }
            RoomInbound::NextRound => self.next_round(&player_id).await,
            RoomInbound::SetCategory { category } => self.set_category(&player_id, category).await,
            RoomInbound::SetConfig {
                hint_interval_sec,
                round_duration_sec,
            } => self.set_config(&player_id, hint_interval_sec, round_duration_sec),
            RoomInbound::ResetLobby => self.reset_lobby(&player_id).await,
            RoomInbound::Leave => self.leave(connection_id, &player_id),
        };

        if changed || timed_out {
            self.commit(guess).await;
        }
    }

    async fn join(
        &mut self,
        connection_id: Uuid,
        name: String,
        host_key: Option<String>,
        prior_id: Option<String>,
    ) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let player_id = room.join(name, host_key.as_deref(), prior_id.as_deref());
        let reconnected = prior_id.as_deref() == Some(player_id.as_str());
        let is_host = room.is_host(&player_id);
        let previous = self.connections.bind(&connection_id, player_id.clone());
        if let Some(previous) = previous.filter(|previous| *previous != player_id) {
            info!(room_id = %self.room_id, player_id = %previous, %connection_id, "socket rebound to another player");
            self.disconnect_if_offline(&previous);
        }
        info!(
            room_id = %self.room_id,
            %player_id,
            %connection_id,
            reconnected,
            is_host,
            "player joined"
        );

        self.persist().await;
        let joined = RoomOutbound::Joined(JoinedPayload {
            player_id: player_id.clone(),
        });
        match serde_json::to_string(&joined) {
            Ok(text) => {
                if !self.connections.send_to(&connection_id, &text) {
                    debug!(room_id = %self.room_id, %connection_id, "joining socket already closed");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize joined message"),
        }
        self.publish(None).await;
    }

    async fn start_game(&mut self, player_id: &str) -> bool {
        let Some(room) = self.room.as_ref() else {
            return false;
        };
        if !room.can_start(player_id) {
            debug!(room_id = %self.room_id, %player_id, "startGame ignored");
            return false;
        }
        if room.current_person.is_none() {
            let Some(person) = self.draw_next_person().await else {
                return true;
            };
            if let Some(room) = self.room.as_mut() {
                room.install_person(person);
            }
        }
        self.begin_round(RoomEvent::StartGame)
    }

    async fn next_round(&mut self, player_id: &str) -> bool {
        if !self
            .room
            .as_ref()
            .is_some_and(|room| room.can_advance(player_id))
        {
            debug!(room_id = %self.room_id, %player_id, "nextRound ignored");
            return false;
        }
        let Some(person) = self.draw_next_person().await else {
            return true;
        };
        if let Some(room) = self.room.as_mut() {
            room.install_person(person);
        }
        self.begin_round(RoomEvent::NextRound)
    }

    fn begin_round(&mut self, event: RoomEvent) -> bool {
        let now = self.state.now_ms();
        let Some(room) = self.room.as_mut() else {
            return false;
        };
        match room.start_round(event, now) {
            Ok(()) => {
                info!(
                    room_id = %self.room_id,
                    round = room.current_round(),
                    total_rounds = room.total_rounds,
                    "round started"
                );
                true
            }
            Err(err) => {
                debug!(room_id = %self.room_id, error = %err, "round not started");
                false
            }
        }
    }

    /// Pop the next id and resolve it. The id stays consumed when it cannot be resolved.
    async fn draw_next_person(&mut self) -> Option<Person> {
        let person_id = self.room.as_mut()?.pop_next_person_id()?;
        match self.state.persons().find_person(person_id.clone()).await {
            Ok(Some(entity)) => Some(entity.into()),
            Ok(None) => {
                warn!(room_id = %self.room_id, %person_id, "drawn person no longer exists; skipping");
                None
            }
            Err(err) => {
                warn!(room_id = %self.room_id, %person_id, error = %err, "failed to resolve person");
                None
            }
        }
    }

    fn guess(&mut self, player_id: &str, answer: String) -> Option<GuessView> {
        let now = self.state.now_ms();
        let room = self.room.as_mut()?;
        let Some(guess) = room.apply_guess(player_id, answer, now) else {
            debug!(room_id = %self.room_id, %player_id, "guess ignored");
            return None;
        };
        debug!(
            room_id = %self.room_id,
            %player_id,
            correct = guess.correct,
            points = guess.points,
            "guess recorded"
        );
        if room.status == RoundStatus::RoundEnd {
            info!(room_id = %self.room_id, "every connected player found; round ended");
        }
        Some(GuessView::from(&guess))
    }

    async fn set_category(&mut self, player_id: &str, category: String) -> bool {
        let Some(room) = self.room.as_ref() else {
            return false;
        };
        if !room.can_configure(player_id) {
            debug!(room_id = %self.room_id, %player_id, "setCategory ignored");
            return false;
        }
        let Some(person_ids) = self.draw(category.clone(), room.total_rounds).await else {
            return false;
        };
        let Some(room) = self.room.as_mut() else {
            return false;
        };
        info!(room_id = %self.room_id, %category, drawn = person_ids.len(), "category changed");
        room.change_category(category, person_ids);
        true
    }

    fn set_config(
        &mut self,
        player_id: &str,
        hint_interval_sec: Option<f64>,
        round_duration_sec: Option<f64>,
    ) -> bool {
        let Some(room) = self.room.as_mut() else {
            return false;
        };
        if !room.can_configure(player_id) {
            debug!(room_id = %self.room_id, %player_id, "setConfig ignored");
            return false;
        }
        room.apply_config(hint_interval_sec, round_duration_sec)
    }

    async fn reset_lobby(&mut self, player_id: &str) -> bool {
        let Some(room) = self.room.as_ref() else {
            return false;
        };
        if !room.is_host(player_id) {
            debug!(room_id = %self.room_id, %player_id, "resetLobby ignored");
            return false;
        }
        let category = room.selected_category.clone();
        let Some(person_ids) = self.draw(category, room.total_rounds).await else {
            return false;
        };
        let Some(room) = self.room.as_mut() else {
            return false;
        };
        room.reset_lobby(person_ids);
        info!(room_id = %self.room_id, "room reset to lobby");
        true
    }

    /// Draw a fresh queue; `None` when the source fails or has nothing for the category.
    async fn draw(&self, category: String, total_rounds: u32) -> Option<Vec<String>> {
        match self
            .state
            .persons()
            .random_person_ids(category.clone(), total_rounds as usize)
            .await
        {
            Ok(ids) if !ids.is_empty() => Some(ids),
            Ok(_) => {
                debug!(room_id = %self.room_id, %category, "no persons for category; keeping queue");
                None
            }
            Err(err) => {
                warn!(room_id = %self.room_id, %category, error = %err, "failed to draw persons");
                None
            }
        }
    }

    fn leave(&mut self, connection_id: Uuid, player_id: &str) -> bool {
        self.connections.unbind(&connection_id);
        info!(room_id = %self.room_id, %player_id, %connection_id, "player left");
        self.disconnect_if_offline(player_id)
    }

    async fn on_close(&mut self, connection_id: Uuid) {
        let Some(player_id) = self.connections.remove(&connection_id) else {
            debug!(room_id = %self.room_id, %connection_id, "anonymous socket closed");
            return;
        };
        info!(room_id = %self.room_id, %player_id, %connection_id, "socket closed");
        let timed_out = self.reconcile();
        if self.disconnect_if_offline(&player_id) || timed_out {
            self.commit(None).await;
        }
    }

    fn disconnect_if_offline(&mut self, player_id: &str) -> bool {
        if self.connections.is_player_online(player_id) {
            return false;
        }
        let Some(room) = self.room.as_mut() else {
            return false;
        };
        let was_host = room.is_host(player_id);
        if !room.mark_disconnected(player_id) {
            return false;
        }
        if was_host {
            info!(
                room_id = %self.room_id,
                %player_id,
                new_host = ?room.host_id,
                "host disconnected; host role transferred"
            );
        }
        true
    }

    async fn on_timer(&mut self) {
        let now = self.state.now_ms();
        let Some(room) = self.room.as_mut() else {
            return;
        };
        match room.on_wake(now) {
            WakeOutcome::RoundEnded(reason) => {
                info!(room_id = %self.room_id, ?reason, "round ended");
            }
            outcome => {
                debug!(room_id = %self.room_id, ?outcome, visible_hints = room.visible_hints, "timer fired");
            }
        }
        self.commit(None).await;
    }

    async fn commit(&mut self, guess: Option<GuessView>) {
        self.persist().await;
        self.publish(guess).await;
    }

    async fn persist(&mut self) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        room.updated_at = SystemTime::now();
        let entity = RoomEntity::from(&*room);

        let Some(store) = self.state.room_store().await else {
            warn!(room_id = %self.room_id, "storage unavailable (degraded mode); room kept in memory only");
            return;
        };
        if let Err(err) = store.save_room(entity).await {
            warn!(room_id = %self.room_id, error = %err, "failed to persist room");
        }
    }

    /// Broadcast the optional guess then the snapshot. Players whose last socket
    /// failed are marked disconnected and a new snapshot goes out.
    async fn publish(&mut self, guess: Option<GuessView>) {
        let mut orphaned = Vec::new();
        if let Some(guess) = guess {
            orphaned.extend(self.broadcast(&RoomOutbound::GuessResult(guess)));
        }

        loop {
            let Some(room) = self.room.as_ref() else {
                return;
            };
            let update = RoomOutbound::RoomUpdate(room.into());
            orphaned.extend(self.broadcast(&update));
            if orphaned.is_empty() {
                return;
            }

            for player_id in orphaned.drain(..) {
                info!(room_id = %self.room_id, %player_id, "socket unreachable; player disconnected");
                if let Some(room) = self.room.as_mut() {
                    room.mark_disconnected(&player_id);
                }
            }
            self.persist().await;
        }
    }

    fn broadcast(&mut self, message: &RoomOutbound) -> Vec<String> {
        match ServerEvent::from_outbound(message) {
            Ok(event) => self.spectators.broadcast(event),
            Err(err) => warn!(error = %err, "failed to serialize spectator event"),
        }
        match serde_json::to_string(message) {
            Ok(text) => self.connections.broadcast(&text),
            Err(err) => {
                warn!(error = %err, "failed to serialize room message");
                Vec::new()
            }
        }
    }
}

fn delay_until(at: i64, now: i64) -> Duration {
    Duration::from_millis(at.saturating_sub(now).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};
    use tokio::time::Instant;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PersonEntity,
            persons::PersonCatalog,
            room_store::{MemoryRoomStore, RoomStore},
        },
        state::{AppState, Clock},
    };

    const EPOCH: i64 = 1_700_000_000_000;

    /// Wall clock that follows Tokio's (pausable) time.
    struct TokioClock {
        start: Instant,
    }

    impl Clock for TokioClock {
        fn now_ms(&self) -> i64 {
            EPOCH + self.start.elapsed().as_millis() as i64
        }
    }

    fn catalog() -> PersonCatalog {
        let person = |id: &str, name: &str, category: &str| PersonEntity {
            id: id.into(),
            name: name.into(),
            categories: vec![category.into()],
            occupation: "mathematician".into(),
            hints: (1..=5).map(|n| format!("{name} clue {n}")).collect(),
        };
        PersonCatalog::new(vec![
            person("ada", "Ada Lovelace", "science"),
            person("alan", "Alan Turing", "tech"),
        ])
    }

    async fn app_state(store: Option<MemoryRoomStore>) -> SharedState {
        let state = AppState::with_clock(
            AppConfig::default(),
            Arc::new(catalog()),
            Arc::new(TokioClock {
                start: Instant::now(),
            }),
        );
        if let Some(store) = store {
            state.set_room_store(Arc::new(store)).await;
        }
        state
    }

    struct Client {
        id: Uuid,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    impl Client {
        async fn connect(handle: &RoomHandle) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = Uuid::new_v4();
            handle.connect(id, tx).await.unwrap();
            Self { id, rx }
        }

        async fn send(&self, handle: &RoomHandle, message: Value) {
            let message = RoomInbound::from_json_str(&message.to_string()).unwrap();
            handle.inbound(self.id, message).await.unwrap();
        }

        /// Every frame queued so far, as JSON.
        fn drain(&mut self) -> Vec<Value> {
            let mut frames = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                if let Message::Text(text) = message {
                    frames.push(serde_json::from_str(text.as_str()).unwrap());
                }
            }
            frames
        }

        async fn join(&mut self, handle: &RoomHandle, name: &str, host_key: Option<&str>) -> String {
            self.send(handle, json!({"type": "joinRoom", "payload": {"name": name, "hostKey": host_key}}))
                .await;
            handle.snapshot().await.unwrap();
            let joined = self
                .drain()
                .into_iter()
                .find(|frame| frame["type"] == "joined")
                .unwrap();
            joined["payload"]["playerId"].as_str().unwrap().to_string()
        }
    }

    async fn snapshot_json(handle: &RoomHandle) -> Value {
        serde_json::to_value(handle.snapshot().await.unwrap().unwrap()).unwrap()
    }

    /// Room `r1` in category science with a ready host and guest.
    async fn lobby(state: &SharedState) -> (RoomHandle, Client, String, Client, String) {
        let handle = state.room("r1");
        handle.init("key".into(), 1, "science".into()).await.unwrap();
        let mut host = Client::connect(&handle).await;
        let host_id = host.join(&handle, "Host", Some("key")).await;
        let mut guest = Client::connect(&handle).await;
        let guest_id = guest.join(&handle, "Guest", None).await;
        for client in [&host, &guest] {
            client
                .send(&handle, json!({"type": "toggleReady", "payload": {"ready": true}}))
                .await;
        }
        (handle, host, host_id, guest, guest_id)
    }

    #[tokio::test(start_paused = true)]
    async fn init_is_idempotent_and_rejects_empty_draws() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let handle = state.room("abc");
        assert!(handle.snapshot().await.unwrap().is_none());

        assert_eq!(
            handle.init("k1".into(), 3, "mix".into()).await.unwrap(),
            "abc"
        );
        assert_eq!(
            handle.init("other".into(), 9, "tech".into()).await.unwrap(),
            "abc"
        );
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["totalRounds"], 3);
        assert_eq!(snapshot["roundStatus"], "lobby");

        let empty = state.room("zzz");
        assert!(matches!(
            empty.init("k".into(), 3, "sports".into()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn init_fails_in_degraded_mode() {
        let state = app_state(None).await;
        assert!(matches!(
            state.room("abc").init("k".into(), 1, "mix".into()).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn full_round_until_everyone_found() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, mut host, host_id, mut guest, guest_id) = lobby(&state).await;

        guest.send(&handle, json!({"type": "startGame"})).await;
        assert_eq!(snapshot_json(&handle).await["roundStatus"], "lobby");

        host.send(&handle, json!({"type": "startGame"})).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["hostId"], host_id.as_str());
        assert_eq!(snapshot["roundStatus"], "playing");
        assert_eq!(snapshot["visibleHints"], 1);
        assert_eq!(snapshot["hints"][0], "_ _ _   _ _ _ _ _ _ _ _");
        assert_eq!(snapshot["guesses"], json!([]));
        host.drain();
        guest.drain();

        guest
            .send(&handle, json!({"type": "guess", "payload": {"answer": "Alan Turing"}}))
            .await;
        host.send(&handle, json!({"type": "guess", "payload": {"answer": "ada lovelace"}}))
            .await;
        handle.snapshot().await.unwrap();

        let frames = guest.drain();
        let kinds: Vec<_> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec!["guessResult", "roomUpdate", "guessResult", "roomUpdate"]
        );
        assert_eq!(frames[0]["payload"]["correct"], false);
        assert_eq!(frames[2]["payload"]["points"], 100);
        assert_eq!(frames[3]["payload"]["players"][0]["score"], 100);

        guest
            .send(&handle, json!({"type": "guess", "payload": {"answer": "Ada Lovelace"}}))
            .await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["roundStatus"], "roundEnd");
        assert_eq!(snapshot["revealedName"], "Ada Lovelace");
        assert_eq!(snapshot["gameOver"], true);
        assert_eq!(snapshot["guesses"].as_array().unwrap().len(), 3);

        let scores: Vec<_> = snapshot["players"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["id"].as_str().unwrap().to_string(), p["score"].as_u64().unwrap()))
            .collect();
        assert_eq!(scores[0], (host_id, 100));
        assert_eq!(scores[1].0, guest_id);
        assert_eq!(scores[1].1, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_reveals_hints_then_ends_the_round() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, _, _guest, _) = lobby(&state).await;
        host.send(&handle, json!({"type": "startGame"})).await;
        let started = snapshot_json(&handle).await;
        let start = started["roundStartTime"].as_i64().unwrap();
        assert_eq!(started["nextHintAt"], start + 5_000);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["visibleHints"], 2);
        assert_eq!(snapshot["nextHintAt"], start + 10_000);

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["visibleHints"], 6);
        assert_eq!(snapshot["roundStatus"], "playing");
        assert_eq!(snapshot["nextHintAt"], start + 29_000);

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["roundStatus"], "roundEnd");
        assert_eq!(snapshot["revealedName"], "Ada Lovelace");
        assert_eq!(snapshot["nextHintAt"], Value::Null);
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_coordinator_applies_overdue_timeout_on_fetch() {
        let store = MemoryRoomStore::new();
        let now = EPOCH;
        let mut room = Room::new(
            "old".into(),
            "key".into(),
            2,
            "mix".into(),
            AppConfig::default().room_defaults(),
            vec!["ada".into(), "alan".into()],
        );
        let host = room.join("Host".into(), Some("key"), None);
        room.set_ready(&host, true);
        room.pop_next_person_id();
        room.install_person(catalog_person("ada"));
        room.start_round(RoomEvent::StartGame, now - 60_000).unwrap();
        store.save_room(RoomEntity::from(&room)).await.unwrap();

        let state = app_state(Some(store.clone())).await;
        let snapshot = snapshot_json(&state.room("old")).await;
        assert_eq!(snapshot["roundStatus"], "roundEnd");
        assert_eq!(snapshot["revealedName"], "Ada Lovelace");
        assert_eq!(snapshot["gameOver"], false);

        let stored = store.load_room("old".into()).await.unwrap().unwrap();
        assert_eq!(stored.revealed_name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_coordinator_resumes_the_hint_timer() {
        let store = MemoryRoomStore::new();
        let mut room = Room::new(
            "live".into(),
            "key".into(),
            1,
            "mix".into(),
            AppConfig::default().room_defaults(),
            vec!["ada".into()],
        );
        room.pop_next_person_id();
        room.install_person(catalog_person("ada"));
        room.start_round(RoomEvent::StartGame, EPOCH - 3_000).unwrap();
        store.save_room(RoomEntity::from(&room)).await.unwrap();

        let state = app_state(Some(store)).await;
        let handle = state.room("live");
        let (initial, mut feed) = handle.subscribe().await.unwrap();
        assert_eq!(initial.unwrap().event.as_deref(), Some("roomUpdate"));

        let event = feed.recv().await.unwrap();
        let data: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(event.event.as_deref(), Some("roomUpdate"));
        assert_eq!(data["visibleHints"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn host_role_moves_when_the_host_socket_closes() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, host_id, _guest, guest_id) = lobby(&state).await;

        handle.disconnect(host.id).await.unwrap();
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["hostId"], guest_id.as_str());
        assert_eq!(snapshot["players"][0]["id"], host_id.as_str());
        assert_eq!(snapshot["players"][0]["connected"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn second_socket_keeps_player_connected() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, host_id, _guest, _) = lobby(&state).await;

        let mut tab = Client::connect(&handle).await;
        tab.send(
            &handle,
            json!({"type": "joinRoom", "payload": {"name": "Host", "playerId": host_id}}),
        )
        .await;
        handle.disconnect(host.id).await.unwrap();

        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["hostId"], host_id.as_str());
        assert_eq!(snapshot["players"][0]["connected"], true);
        assert!(tab.drain().iter().any(|frame| frame["type"] == "joined"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_socket_disconnects_its_player() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, _, guest, guest_id) = lobby(&state).await;
        drop(guest);

        host.send(&handle, json!({"type": "toggleReady", "payload": {"ready": false}}))
            .await;
        let snapshot = snapshot_json(&handle).await;
        let guest = snapshot["players"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["id"] == guest_id.as_str())
            .unwrap()
            .clone();
        assert_eq!(guest["connected"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn host_only_lobby_commands() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, _, guest, _) = lobby(&state).await;

        guest
            .send(&handle, json!({"type": "setConfig", "payload": {"hintIntervalSec": 10}}))
            .await;
        assert_eq!(snapshot_json(&handle).await["hintIntervalSec"], 5);

        host.send(
            &handle,
            json!({"type": "setConfig", "payload": {"hintIntervalSec": 10, "roundDurationSec": 500}}),
        )
        .await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["hintIntervalSec"], 10);
        assert_eq!(snapshot["roundDurationSec"], 30);

        host.send(&handle, json!({"type": "setCategory", "payload": {"category": "Tech"}}))
            .await;
        assert_eq!(snapshot_json(&handle).await["selectedCategory"], "tech");

        host.send(&handle, json!({"type": "setCategory", "payload": {"category": "sports"}}))
            .await;
        assert_eq!(snapshot_json(&handle).await["selectedCategory"], "tech");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_game_over_zeroes_players() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, _, guest, _) = lobby(&state).await;
        host.send(&handle, json!({"type": "startGame"})).await;
        for client in [&host, &guest] {
            client
                .send(&handle, json!({"type": "guess", "payload": {"answer": "Ada Lovelace"}}))
                .await;
        }
        assert_eq!(snapshot_json(&handle).await["gameOver"], true);

        host.send(&handle, json!({"type": "nextRound"})).await;
        assert_eq!(snapshot_json(&handle).await["roundStatus"], "roundEnd");

        host.send(&handle, json!({"type": "resetLobby"})).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["roundStatus"], "lobby");
        assert_eq!(snapshot["gameOver"], false);
        assert_eq!(snapshot["currentRound"], 0);
        assert_eq!(snapshot["roundHistory"], json!([]));
        for player in snapshot["players"].as_array().unwrap() {
            assert_eq!(player["score"], 0);
            assert_eq!(player["ready"], false);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn messages_before_join_are_dropped() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let handle = state.room("r1");
        handle.init("key".into(), 1, "science".into()).await.unwrap();
        let mut anonymous = Client::connect(&handle).await;
        anonymous.send(&handle, json!({"type": "startGame"})).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["roundStatus"], "lobby");
        assert!(anonymous.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_reveal_replays_the_same_person() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, _, guest, _) = lobby(&state).await;
        host.send(&handle, json!({"type": "startGame"})).await;
        for client in [&host, &guest] {
            client
                .send(&handle, json!({"type": "guess", "payload": {"answer": "Ada Lovelace"}}))
                .await;
        }
        let revealed = snapshot_json(&handle).await;
        assert_eq!(revealed["roundStatus"], "roundEnd");
        assert_eq!(revealed["gameOver"], true);

        tokio::time::sleep(Duration::from_secs(3)).await;
        guest.send(&handle, json!({"type": "startGame"})).await;
        assert_eq!(snapshot_json(&handle).await["roundStatus"], "roundEnd");

        host.send(&handle, json!({"type": "startGame"})).await;
        let snapshot = snapshot_json(&handle).await;
        let start = snapshot["roundStartTime"].as_i64().unwrap();
        assert_eq!(snapshot["roundStatus"], "playing");
        assert_eq!(snapshot["visibleHints"], 1);
        assert_eq!(snapshot["guesses"], json!([]));
        assert_eq!(snapshot["revealedName"], Value::Null);
        assert_eq!(snapshot["currentRound"], 1);
        assert_eq!(snapshot["roundHistory"], revealed["roundHistory"]);
        assert_eq!(snapshot["players"], revealed["players"]);
        assert!(start >= EPOCH + 3_000);
        assert_eq!(snapshot["nextHintAt"], start + 5_000);

        host.send(&handle, json!({"type": "guess", "payload": {"answer": "Ada Lovelace"}}))
            .await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["guesses"][0]["correct"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoining_as_another_player_releases_the_first() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, _host, _, mut guest, guest_id) = lobby(&state).await;

        let other_id = guest.join(&handle, "Other", None).await;
        assert_ne!(other_id, guest_id);
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(player_json(&snapshot, &guest_id)["connected"], false);
        assert_eq!(player_json(&snapshot, &other_id)["connected"], true);

        handle.disconnect(guest.id).await.unwrap();
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(player_json(&snapshot, &guest_id)["connected"], false);
        assert_eq!(player_json(&snapshot, &other_id)["connected"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_redraws_a_full_queue_for_every_round() {
        let store = MemoryRoomStore::new();
        let state = app_state(Some(store.clone())).await;
        let handle = state.room("r2");
        handle.init("key".into(), 2, "mix".into()).await.unwrap();
        let mut host = Client::connect(&handle).await;
        host.join(&handle, "Host", Some("key")).await;
        host.send(&handle, json!({"type": "toggleReady", "payload": {"ready": true}}))
            .await;

        for command in ["startGame", "nextRound"] {
            host.send(&handle, json!({"type": command})).await;
            assert_eq!(snapshot_json(&handle).await["roundStatus"], "playing");
            for answer in ["Ada Lovelace", "Alan Turing"] {
                host.send(&handle, json!({"type": "guess", "payload": {"answer": answer}}))
                    .await;
            }
            assert_eq!(snapshot_json(&handle).await["roundStatus"], "roundEnd");
        }
        let finished = snapshot_json(&handle).await;
        assert_eq!(finished["gameOver"], true);
        assert_eq!(finished["currentRound"], 2);
        let stored = store.load_room("r2".into()).await.unwrap().unwrap();
        assert!(stored.remaining_person_ids.is_empty());

        host.send(&handle, json!({"type": "resetLobby"})).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["roundStatus"], "lobby");
        assert_eq!(snapshot["totalRounds"], 2);
        let stored = store.load_room("r2".into()).await.unwrap().unwrap();
        assert_eq!(stored.remaining_person_ids.len(), 2);
        assert!(stored.round_history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_interval_paces_the_first_reveals() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let (handle, host, _, _guest, _) = lobby(&state).await;
        host.send(&handle, json!({"type": "setConfig", "payload": {"hintIntervalSec": 8}}))
            .await;
        host.send(&handle, json!({"type": "startGame"})).await;
        let started = snapshot_json(&handle).await;
        let start = started["roundStartTime"].as_i64().unwrap();
        assert_eq!(started["hintIntervalSec"], 8);
        assert_eq!(started["nextHintAt"], start + 8_000);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(snapshot_json(&handle).await["visibleHints"], 1);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let snapshot = snapshot_json(&handle).await;
        assert_eq!(snapshot["visibleHints"], 2);
        assert_eq!(snapshot["nextHintAt"], start + 16_000);
    }

    #[tokio::test(start_paused = true)]
    async fn coordinator_without_a_room_retires_and_is_replaced() {
        let state = app_state(Some(MemoryRoomStore::new())).await;
        let stale = state.room("later");
        assert!(stale.snapshot().await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(stale.is_closed());
        assert_eq!(state.active_rooms(), 0);

        assert_eq!(
            stale.init("key".into(), 1, "science".into()).await.unwrap(),
            "later"
        );
        let fresh = state.room("later");
        assert!(!fresh.is_closed());
        assert_eq!(snapshot_json(&fresh).await["id"], "later");
        assert_eq!(state.active_rooms(), 1);
    }

    fn player_json(snapshot: &Value, id: &str) -> Value {
        snapshot["players"]
            .as_array()
            .unwrap()
            .iter()
            .find(|player| player["id"] == id)
            .cloned()
            .unwrap()
    }

    fn catalog_person(id: &str) -> Person {
        let entity = PersonEntity {
            id: id.into(),
            name: "Ada Lovelace".into(),
            categories: vec!["science".into()],
            occupation: "mathematician".into(),
            hints: (1..=5).map(|n| format!("clue {n}")).collect(),
        };
        entity.into()
    }
}
