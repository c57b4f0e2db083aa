use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Person record as authored in the catalog (clues only, no masked name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonEntity {
    /// Stable identifier for the person.
    pub id: String,
    /// Full name, which is also the expected answer.
    pub name: String,
    /// Category codes the person belongs to (e.g. "science").
    #[serde(default)]
    pub categories: Vec<String>,
    /// Occupation shown to players from the start of a round.
    pub occupation: String,
    /// Free-text clues, revealed one by one after the masked name.
    pub hints: Vec<String>,
}

/// Persisted round status of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatusEntity {
    /// Waiting for the host to start.
    Lobby,
    /// A round is running.
    Playing,
    /// The name is revealed.
    RoundEnd,
}

/// Member of a room stored alongside the room blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Player id, reused on reconnect.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Points accumulated since the last reset.
    pub score: u32,
    /// Ready flag toggled in the lobby.
    pub ready: bool,
    /// Whether a socket is bound to the player.
    pub connected: bool,
}

/// Guess appended to the round log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuessEntity {
    /// Author of the guess.
    pub player_id: String,
    /// Author's name at the time of the guess.
    pub player_name: String,
    /// Raw answer as typed.
    pub answer: String,
    /// Whether the answer matched the name.
    pub correct: bool,
    /// Milliseconds since the round started.
    pub time_ms: i64,
    /// Points awarded for this guess.
    pub points: u32,
}

/// Person currently being guessed, with the masked name already prepended to its hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentPersonEntity {
    /// Catalog id.
    pub id: String,
    /// The answer.
    pub name: String,
    /// Occupation shown during the round.
    pub occupation: String,
    /// Masked name followed by the clues.
    pub hints: Vec<String>,
}

/// Entry of the played-rounds history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundRecordEntity {
    /// Catalog id of the person played.
    pub id: String,
    /// Name of the person played.
    pub name: String,
}

/// Aggregate room blob persisted by the room stores.
///
/// Timestamps inside the round (`round_start_time`, `next_hint_at`,
/// `last_hint_revealed_at`) are Unix epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: String,
    /// Secret handed out at creation, used to claim the host role.
    pub host_key: String,
    /// Current host, `None` while nobody holding the role is connected.
    pub host_id: Option<String>,
    /// Members in join order.
    pub players: Vec<PlayerEntity>,
    /// Lifecycle status.
    pub round_status: RoundStatusEntity,
    /// Category the queue was drawn from.
    pub selected_category: String,
    /// Person of the current or last round.
    pub current_person: Option<CurrentPersonEntity>,
    /// Number of hints shown, masked name included.
    pub visible_hints: u32,
    /// Guess log of the current round.
    pub guesses: Vec<GuessEntity>,
    /// Start of the current round.
    pub round_start_time: Option<i64>,
    /// Hard limit of a round.
    pub round_duration_sec: u32,
    /// Delay between two hint reveals.
    pub hint_interval_sec: u32,
    /// Grace period after the last hint before the round ends.
    pub round_end_delay_sec: u32,
    /// Number of persons drawn per game.
    pub total_rounds: u32,
    /// Ids still to be played, in draw order.
    pub remaining_person_ids: Vec<String>,
    /// Persons played since the last reset.
    pub round_history: Vec<RoundRecordEntity>,
    /// Name shown once the round ended.
    pub revealed_name: Option<String>,
    /// Next timer wake-up.
    pub next_hint_at: Option<i64>,
    /// When the last hint appeared; starts the end-of-round grace.
    pub last_hint_revealed_at: Option<i64>,
    /// Players who already found the current person.
    pub round_correct_ids: Vec<String>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the room blob was written.
    pub updated_at: SystemTime,
}
