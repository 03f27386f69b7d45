//! chat-relay - real-time chat relay
//!
//! Clients connect over WebSocket, claim a display name, chat in the global
//! room or in ephemeral sub-rooms, and receive a live presence list.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod web;

pub use chat::{ChatHub, HubHandle, SessionController};
pub use config::Config;
pub use error::{RelayError, Result};
pub use web::WebServer;
