//! WebSocket frame types for chat communication.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::chat::{Ack, ClientEvent};

/// Frame sent from client to server.
///
/// `{"event": "chat:message", "data": "hi", "ack": 3}`
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
    /// Acknowledgment ID; when present the server answers with an `ack` frame.
    #[serde(default)]
    pub ack: Option<u64>,
}

/// Error decoding a client frame into an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The event name is not recognised.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl ClientFrame {
    /// Decode the frame into a chat event and its acknowledgment ID.
    ///
    /// Payloads of the wrong type are not errors: a non-string name becomes
    /// no name, non-string text becomes no text (and is dropped later), and a
    /// missing room ID becomes an empty one that matches no room.
    pub fn into_event(self) -> Result<(ClientEvent, Option<u64>), FrameError> {
        let event = match self.event.as_str() {
            "user:join" => ClientEvent::UserJoin {
                name: self.data.as_str().map(str::to_string),
            },
            "chat:message" => {
                let (text, room) = match &self.data {
                    Value::Object(map) => (
                        map.get("text").and_then(Value::as_str).map(str::to_string),
                        map.get("roomId")
                            .or_else(|| map.get("room"))
                            .and_then(room_code),
                    ),
                    other => (other.as_str().map(str::to_string), None),
                };
                ClientEvent::ChatMessage { text, room }
            }
            "room:create" => ClientEvent::RoomCreate,
            "room:join" => ClientEvent::RoomJoin {
                room_id: room_id_payload(&self.data),
            },
            "room:leave" => ClientEvent::RoomLeave {
                room_id: room_id_payload(&self.data),
            },
            _ => return Err(FrameError::UnknownEvent(self.event)),
        };
        Ok((event, self.ack))
    }
}

/// Room codes may arrive as strings or numbers.
fn room_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn room_id_payload(data: &Value) -> String {
    let value = match data {
        Value::Object(map) => map.get("roomId").or_else(|| map.get("room")),
        other => Some(other),
    };
    value.and_then(room_code).unwrap_or_default()
}

/// Frame sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ServerMessage {
    /// Chat or system message.
    #[serde(rename = "chat:message")]
    ChatMessage {
        /// Message payload.
        data: ChatPayload,
    },
    /// Presence list.
    #[serde(rename = "users:update")]
    UsersUpdate {
        /// Display names in join order.
        data: Vec<String>,
    },
    /// Acknowledgment of a client event.
    #[serde(rename = "ack")]
    Ack {
        /// ID the client sent with the event.
        id: u64,
        /// Acknowledgment payload.
        data: AckPayload,
    },
    /// Transport-level error, such as an unparseable frame.
    #[serde(rename = "error")]
    Error {
        /// Error payload.
        data: ErrorPayload,
    },
}

/// Chat message payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChatPayload {
    /// Sender display name.
    pub username: String,
    /// Message text.
    pub text: String,
    /// Epoch milliseconds.
    pub ts: i64,
    /// Whether this is a system announcement.
    pub system: bool,
    /// Room the message was delivered to; absent for the global room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Acknowledgment payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Ack> for AckPayload {
    fn from(ack: Ack) -> Self {
        let mut payload = Self {
            ok: ack.is_ok(),
            assigned_name: None,
            room_code: None,
            error: None,
        };
        match ack {
            Ack::Joined { assigned_name } => payload.assigned_name = Some(assigned_name),
            Ack::RoomCreated { room_code } => payload.room_code = Some(room_code),
            Ack::Ok => {}
            Ack::Failed { error } => payload.error = Some(error),
        }
        payload
    }
}

/// Error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl ServerMessage {
    /// Create an error frame.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            data: ErrorPayload {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
