use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::dto::room::{GuessView, RoomSnapshot};

/// Messages accepted from room WebSocket clients, `{type, payload}` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomInbound {
    /// Bind the socket to a new or returning player.
    JoinRoom {
        /// Display name.
        name: String,
        /// Host secret, grants the role when no connected host exists.
        host_key: Option<String>,
        /// Id from a previous `joined`, to reconnect.
        player_id: Option<String>,
    },
    /// Flip the sender's ready flag.
    ToggleReady {
        /// New flag value.
        ready: bool,
    },
    /// Host starts a round.
    StartGame,
    /// Answer attempt for the current person.
    Guess {
        /// Answer as typed.
        answer: String,
    },
    /// Host moves on after a reveal.
    NextRound,
    /// Host switches category in the lobby.
    SetCategory {
        /// Category code.
        category: String,
    },
    /// Values that are not numbers are carried as `None` and left untouched.
    SetConfig {
        /// Seconds between reveals.
        hint_interval_sec: Option<f64>,
        /// Hard round limit in seconds.
        round_duration_sec: Option<f64>,
    },
    /// Host sends everyone back to the lobby.
    ResetLobby,
    /// Unbind the socket without closing it.
    Leave,
}

/// Reasons an inbound frame is dropped.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Not JSON, or the payload has the wrong shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// `type` names no known message.
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    /// A required text field is empty after trimming.
    #[error("field `{0}` is missing or blank")]
    Blank(&'static str),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinPayload {
    name: String,
    #[serde(default)]
    host_key: Option<String>,
    #[serde(default)]
    player_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadyPayload {
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct GuessPayload {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigPayload {
    #[serde(default)]
    hint_interval_sec: Value,
    #[serde(default)]
    round_duration_sec: Value,
}

impl RoomInbound {
    /// Parse a text frame. Anything unusable is reported as an [`InboundError`].
    pub fn from_json_str(raw: &str) -> Result<Self, InboundError> {
        let Envelope { kind, payload } = serde_json::from_str(raw)?;
        let payload = if payload.is_null() {
            Value::Object(Default::default())
        } else {
            payload
        };

        let message = match kind.as_str() {
            "joinRoom" => {
                let JoinPayload {
                    name,
                    host_key,
                    player_id,
                } = decode(payload)?;
                Self::JoinRoom {
                    name: non_blank(&name, "name")?,
                    host_key: host_key.filter(|key| !key.is_empty()),
                    player_id: player_id.filter(|id| !id.is_empty()),
                }
            }
            "toggleReady" => {
                let ReadyPayload { ready } = decode(payload)?;
                Self::ToggleReady { ready }
            }
            "startGame" => Self::StartGame,
            "guess" => {
                let GuessPayload { answer } = decode(payload)?;
                Self::Guess {
                    answer: non_blank(&answer, "answer")?,
                }
            }
            "nextRound" => Self::NextRound,
            "setCategory" => {
                let CategoryPayload { category } = decode(payload)?;
                Self::SetCategory {
                    category: non_blank(&category, "category")?.to_lowercase(),
                }
            }
            "setConfig" => {
                let ConfigPayload {
                    hint_interval_sec,
                    round_duration_sec,
                } = decode(payload)?;
                Self::SetConfig {
                    hint_interval_sec: as_seconds(&hint_interval_sec),
                    round_duration_sec: as_seconds(&round_duration_sec),
                }
            }
            "resetLobby" => Self::ResetLobby,
            "leave" => Self::Leave,
            other => return Err(InboundError::UnknownType(other.to_string())),
        };

        Ok(message)
    }

    /// Wire name of the message type, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "joinRoom",
            Self::ToggleReady { .. } => "toggleReady",
            Self::StartGame => "startGame",
            Self::Guess { .. } => "guess",
            Self::NextRound => "nextRound",
            Self::SetCategory { .. } => "setCategory",
            Self::SetConfig { .. } => "setConfig",
            Self::ResetLobby => "resetLobby",
            Self::Leave => "leave",
        }
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, InboundError> {
    Ok(serde_json::from_value(payload)?)
}

fn non_blank(value: &str, field: &'static str) -> Result<String, InboundError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InboundError::Blank(field));
    }
    Ok(trimmed.to_string())
}

/// Numbers and numeric strings are accepted as seconds.
fn as_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Payload of the `joined` message.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPayload {
    /// Id to resend as `playerId` when reconnecting.
    pub player_id: String,
}

/// Messages pushed to room WebSocket clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RoomOutbound {
    /// Unicast to the joining connection.
    Joined(JoinedPayload),
    /// Full snapshot, broadcast after every change.
    RoomUpdate(RoomSnapshot),
    /// A single guess, broadcast before the snapshot that includes it.
    GuessResult(GuessView),
}

impl RoomOutbound {
    /// Event name used when mirroring the message on SSE.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Joined(_) => "joined",
            Self::RoomUpdate(_) => "roomUpdate",
            Self::GuessResult(_) => "guessResult",
        }
    }
}
