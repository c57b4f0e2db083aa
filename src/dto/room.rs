use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_category, validate_secret},
    state::{
        room::{Guess, Player, Room, RoundRecord},
        state_machine::RoundStatus,
    },
};

/// Public view of a room member.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Player id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Points since the last reset.
    pub score: u32,
    /// Lobby ready flag.
    pub ready: bool,
    /// Whether the player has a live socket.
    pub connected: bool,
}

/// One entry of the round's guess log, also sent alone as `guessResult`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuessView {
    /// Author id.
    pub player_id: String,
    /// Author name.
    pub player_name: String,
    /// Answer as typed.
    pub answer: String,
    /// Whether it matched the name.
    pub correct: bool,
    /// Milliseconds between the round start and the guess.
    pub time_ms: i64,
    /// Points awarded.
    pub points: u32,
}

/// Person already drawn. Both fields are null for the round being played.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecordView {
    /// Person id, once revealed.
    pub id: Option<String>,
    /// Person name, once revealed.
    pub name: Option<String>,
}

/// Externally visible projection of a room; never exposes the unrevealed answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room id.
    pub id: String,
    /// Current host.
    pub host_id: Option<String>,
    /// Members in join order.
    pub players: Vec<PlayerView>,
    /// Lifecycle status.
    pub round_status: RoundStatus,
    /// Category of the queue.
    pub selected_category: String,
    /// Last round revealed with nothing left to play.
    pub game_over: bool,
    /// Rounds started since the last reset.
    pub current_round: u32,
    /// Persons drawn per game.
    pub total_rounds: u32,
    /// Persons played so far.
    pub round_history: Vec<RoundRecordView>,
    /// Number of hints shown.
    pub visible_hints: u32,
    /// Hints shown so far; the first one is the masked name.
    pub hints: Vec<String>,
    /// Occupation of the current person.
    pub occupation: Option<String>,
    /// Guess log of the current round.
    pub guesses: Vec<GuessView>,
    /// Epoch milliseconds.
    pub round_start_time: Option<i64>,
    /// Hard limit of a round.
    pub round_duration_sec: u32,
    /// Name of the person once the round ended.
    pub revealed_name: Option<String>,
    /// Delay between two reveals.
    pub hint_interval_sec: u32,
    /// Epoch milliseconds of the next scheduled hint or round end.
    pub next_hint_at: Option<i64>,
}

impl From<&Player> for PlayerView {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            score: value.score,
            ready: value.ready,
            connected: value.connected,
        }
    }
}

impl From<&Guess> for GuessView {
    fn from(value: &Guess) -> Self {
        Self {
            player_id: value.player_id.clone(),
            player_name: value.player_name.clone(),
            answer: value.answer.clone(),
            correct: value.correct,
            time_ms: value.time_ms,
            points: value.points,
        }
    }
}

impl From<&RoundRecord> for RoundRecordView {
    fn from(value: &RoundRecord) -> Self {
        Self {
            id: Some(value.id.clone()),
            name: Some(value.name.clone()),
        }
    }
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        let playing = room.status == RoundStatus::Playing;
        let last = room.round_history.len().saturating_sub(1);
        let round_history = room
            .round_history
            .iter()
            .enumerate()
            .map(|(index, record)| {
                if playing && index == last {
                    RoundRecordView {
                        id: None,
                        name: None,
                    }
                } else {
                    record.into()
                }
            })
            .collect();

        Self {
            id: room.id.clone(),
            host_id: room.host_id.clone(),
            players: room.players.values().map(Into::into).collect(),
            round_status: room.status,
            selected_category: room.selected_category.clone(),
            game_over: room.is_game_over(),
            current_round: room.current_round(),
            total_rounds: room.total_rounds,
            round_history,
            visible_hints: room.visible_hints,
            hints: room.visible_hint_texts().to_vec(),
            occupation: room
                .current_person
                .as_ref()
                .map(|person| person.occupation.clone()),
            guesses: room.guesses.iter().map(Into::into).collect(),
            round_start_time: room.round_start_time,
            round_duration_sec: room.round_duration_sec,
            revealed_name: room.revealed_name.clone(),
            hint_interval_sec: room.hint_interval_sec,
            next_hint_at: room.next_wake_at(),
        }
    }
}

/// Payload for `POST /rooms`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Number of persons to draw; server default when omitted.
    #[validate(range(min = 1, max = 50))]
    pub total_rounds: Option<u32>,
    /// Category code, `mix` when omitted.
    #[validate(length(min = 1, max = 64), custom(function = "validate_category"))]
    pub category: Option<String>,
}

/// Identifiers handed to the room creator.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    /// Generated room id.
    pub room_id: String,
    /// Secret to present on `joinRoom` to become host.
    pub host_key: String,
    /// Link players open to join the room.
    pub invite_url: String,
}

/// Payload for `POST /rooms/{id}/init`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitRoomRequest {
    /// Secret the host will present on `joinRoom`.
    #[validate(custom(function = "validate_secret"))]
    pub host_key: String,
    /// Number of persons to draw; server default when omitted.
    #[validate(range(min = 1, max = 50))]
    pub total_rounds: Option<u32>,
    /// Category code, `mix` when omitted.
    #[validate(length(min = 1, max = 64), custom(function = "validate_category"))]
    pub category: Option<String>,
}

/// Result of an init call; the existing id when the room was already set up.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitRoomResponse {
    /// Id of the initialized room.
    pub room_id: String,
}

/// Category codes rooms can draw from.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoriesResponse {
    /// Codes, `mix` first.
    pub categories: Vec<String>,
}
