use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::models::RoundStatusEntity;

/// Round progression of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RoundStatus {
    /// Players gather, ready up, and the host tunes the room.
    Lobby,
    /// A person is being guessed; hints are revealed on a timer.
    Playing,
    /// The answer is revealed; terminal when no person is left in the queue.
    RoundEnd,
}

/// Why a round stopped accepting guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEndReason {
    /// Every connected player found the answer.
    AllFound,
    /// The round's hard deadline passed.
    Deadline,
    /// The grace period after the final hint elapsed.
    HintsExhausted,
}

/// Events that can be applied to a room's round status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts a round from the lobby, or replays the revealed person.
    StartGame,
    /// Host moves on to the next person after a reveal.
    NextRound,
    /// The current round stops.
    EndRound(RoundEndReason),
    /// Host changes the category or the timings.
    Configure,
    /// Host sends everyone back to the lobby.
    ResetLobby,
}

/// Error returned when an event cannot be applied in the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the room was in when the event was received.
    pub from: RoundStatus,
    /// The rejected event.
    pub event: RoomEvent,
}

impl RoundStatus {
    /// Compute the status reached by applying `event`, if the transition is valid.
    pub fn next(self, event: RoomEvent) -> Result<RoundStatus, InvalidTransition> {
        let next = match (self, event) {
            (RoundStatus::Lobby, RoomEvent::StartGame) => RoundStatus::Playing,
            (RoundStatus::Lobby, RoomEvent::Configure) => RoundStatus::Lobby,
            (RoundStatus::Playing, RoomEvent::EndRound(_)) => RoundStatus::RoundEnd,
            (RoundStatus::RoundEnd, RoomEvent::NextRound) => RoundStatus::Playing,
            (RoundStatus::RoundEnd, RoomEvent::StartGame) => RoundStatus::Playing,
            (_, RoomEvent::ResetLobby) => RoundStatus::Lobby,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Whether `event` is accepted from this status.
    pub fn accepts(self, event: RoomEvent) -> bool {
        self.next(event).is_ok()
    }
}

impl From<RoundStatusEntity> for RoundStatus {
    fn from(value: RoundStatusEntity) -> Self {
        match value {
            RoundStatusEntity::Lobby => RoundStatus::Lobby,
            RoundStatusEntity::Playing => RoundStatus::Playing,
            RoundStatusEntity::RoundEnd => RoundStatus::RoundEnd,
        }
    }
}

impl From<RoundStatus> for RoundStatusEntity {
    fn from(value: RoundStatus) -> Self {
        match value {
            RoundStatus::Lobby => RoundStatusEntity::Lobby,
            RoundStatus::Playing => RoundStatusEntity::Playing,
            RoundStatus::RoundEnd => RoundStatusEntity::RoundEnd,
        }
    }
}
