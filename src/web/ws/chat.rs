//! Chat WebSocket handler.
//!
//! Each socket becomes one connection in the session hub. Inbound frames are
//! decoded and forwarded to the hub; the connection's outbound queue is
//! drained into the socket.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chat::{ConnectionId, HubHandle, Outbound};

use super::messages::{ChatPayload, ClientFrame, ServerMessage};

/// State for WebSocket chat handler.
#[derive(Clone)]
pub struct ChatWsState {
    /// Handle to the session hub.
    pub hub: HubHandle,
}

impl ChatWsState {
    /// Create a new chat WebSocket state.
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}

/// WebSocket chat handler.
///
/// GET /ws
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChatWsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<ChatWsState>) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let connection = match state.hub.connect(outbound_tx) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Rejecting WebSocket connection: {}", e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        if !forward_frame(&mut ws_sender, &state, connection, &text).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(%connection, "WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%connection, "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            Some(event) = outbound_rx.recv() => {
                let server_msg = outbound_to_server_message(event);
                if !send_message(&mut ws_sender, &server_msg).await {
                    break;
                }
            }
        }
    }

    let _ = state.hub.disconnect(connection);
}

/// Decode a text frame and hand it to the hub.
///
/// Returns false once the hub is gone.
async fn forward_frame(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    state: &ChatWsState,
    connection: ConnectionId,
    text: &str,
) -> bool {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%connection, "Failed to parse client frame: {}", e);
            let error = ServerMessage::error("invalid_message", "Invalid message format");
            send_message(ws_sender, &error).await;
            return true;
        }
    };

    match frame.into_event() {
        Ok((event, ack)) => state.hub.dispatch(connection, event, ack).is_ok(),
        Err(e) => {
            tracing::debug!(%connection, "Rejected client frame: {}", e);
            send_message(ws_sender, &ServerMessage::error("unknown_event", e.to_string())).await;
            true
        }
    }
}

/// Serialize and send a server frame. Returns false if the socket is closed.
async fn send_message(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!("Failed to serialize server frame: {}", e);
            true
        }
    }
}

/// Convert a queued outbound event to a wire frame.
fn outbound_to_server_message(event: Outbound) -> ServerMessage {
    match event {
        Outbound::Chat(chat) => ServerMessage::ChatMessage {
            data: ChatPayload {
                ts: chat.timestamp_millis(),
                username: chat.sender_name,
                text: chat.text,
                system: chat.is_system,
                room: chat.room,
            },
        },
        Outbound::Users(names) => ServerMessage::UsersUpdate { data: names },
        Outbound::Ack { id, ack } => ServerMessage::Ack {
            id,
            data: ack.into(),
        },
    }
}
