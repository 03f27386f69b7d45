//! Web transport for the chat relay.
//!
//! Serves the chat WebSocket endpoint and a health check.

pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use router::create_router;
pub use server::WebServer;
