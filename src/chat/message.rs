//! Chat event and connection types shared by the session components.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier of a live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a fresh connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A chat event. Never stored, only fanned out.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    /// Sender's display name (the system sender name for announcements).
    pub sender_name: String,
    /// Message text, already trimmed.
    pub text: String,
    /// Timestamp when the event was created.
    pub timestamp: DateTime<Utc>,
    /// Whether this is a system announcement.
    pub is_system: bool,
    /// Room the event was delivered to (None for the global room).
    pub room: Option<String>,
}

impl ChatEvent {
    /// Create a user chat message.
    pub fn new(
        sender_name: impl Into<String>,
        text: impl Into<String>,
        room: Option<String>,
    ) -> Self {
        Self {
            sender_name: sender_name.into(),
            text: text.into(),
            timestamp: Utc::now(),
            is_system: false,
            room,
        }
    }

    /// Create a system announcement.
    pub fn system(
        system_name: impl Into<String>,
        text: impl Into<String>,
        room: Option<String>,
    ) -> Self {
        Self {
            sender_name: system_name.into(),
            text: text.into(),
            timestamp: Utc::now(),
            is_system: true,
            room,
        }
    }

    /// Timestamp as epoch milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Inbound client event, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Claim a display name.
    UserJoin {
        /// Requested display name, if one was sent.
        name: Option<String>,
    },
    /// Send a chat message.
    ChatMessage {
        /// Message text; None when the payload was not a string.
        text: Option<String>,
        /// Target room, if any.
        room: Option<String>,
    },
    /// Create a new room.
    RoomCreate,
    /// Join an existing room.
    RoomJoin {
        /// Room code.
        room_id: String,
    },
    /// Leave a room.
    RoomLeave {
        /// Room code.
        room_id: String,
    },
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserJoin { .. } => "user:join",
            ClientEvent::ChatMessage { .. } => "chat:message",
            ClientEvent::RoomCreate => "room:create",
            ClientEvent::RoomJoin { .. } => "room:join",
            ClientEvent::RoomLeave { .. } => "room:leave",
        }
    }
}

/// Acknowledgment returned to the connection that sent an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Display name assigned by `user:join`.
    Joined {
        /// The assigned, deduplicated name.
        assigned_name: String,
    },
    /// Room created by `room:create`.
    RoomCreated {
        /// The new room code.
        room_code: String,
    },
    /// Plain success.
    Ok,
    /// The operation was rejected without any state change.
    Failed {
        /// User-facing error text.
        error: String,
    },
}

impl Ack {
    /// Create a failure acknowledgment.
    pub fn failed(error: impl ToString) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    /// Whether this acknowledges a success.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Ack::Failed { .. })
    }
}

/// Event queued for delivery to a single connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A chat or system message.
    Chat(ChatEvent),
    /// Full presence list in registry order.
    Users(Vec<String>),
    /// Acknowledgment for the inbound event carrying `id`.
    Ack {
        /// Client-chosen acknowledgment ID.
        id: u64,
        /// The acknowledgment.
        ack: Ack,
    },
}

/// Per-connection outbound queue. Sends never wait for delivery.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Receiving half of a connection's outbound queue.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;
