//! WebSocket module for real-time communication.
//!
//! This module provides the WebSocket transport for the chat relay.

pub mod chat;
pub mod messages;

pub use chat::{chat_ws_handler, ChatWsState};
pub use messages::{ClientFrame, FrameError, ServerMessage};
