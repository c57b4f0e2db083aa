use serde::Serialize;

use crate::dto::ws::RoomOutbound;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name.
    pub event: Option<String>,
    /// JSON `data:` line.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Mirror a room message: the event name is the message type, the data its payload.
    pub fn from_outbound(message: &RoomOutbound) -> serde_json::Result<Self> {
        let name = Some(message.event_name().to_string());
        match message {
            RoomOutbound::Joined(payload) => Self::json(name, payload),
            RoomOutbound::RoomUpdate(snapshot) => Self::json(name, snapshot),
            RoomOutbound::GuessResult(guess) => Self::json(name, guess),
        }
    }
}
