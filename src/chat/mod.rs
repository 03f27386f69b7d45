//! Chat module for the relay.
//!
//! This module provides the connection/session registry and routing engine:
//! - Display-name registry with collision suffixes
//! - Room directory for the global room and ephemeral sub-rooms
//! - Message routing and presence broadcasting
//! - The session controller and the hub task that serializes all events

mod directory;
mod fanout;
mod hub;
mod identity;
mod message;
mod presence;
mod router;
mod session;

pub use directory::{LeftRoom, Room, RoomDirectory, RoomError, RoomTarget, GLOBAL_ROOM};
pub use fanout::Fanout;
pub use hub::{ChatHub, HubCommand, HubHandle};
pub use identity::IdentityRegistry;
pub use message::{
    Ack, ChatEvent, ClientEvent, ConnectionId, Outbound, OutboundReceiver, OutboundSender,
};
pub use presence::broadcast_presence;
pub use router::{MessageRouter, SenderNames};
pub use session::{SessionController, SessionError};
