//! Test helpers for WebSocket end-to-end tests.
//!
//! Provides a running relay on an ephemeral port and a small JSON client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use chat_relay::config::{ChatConfig, ServerConfig};
use chat_relay::{ChatHub, SessionController, WebServer};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding no frame is coming.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(200);

/// Start a relay bound to an ephemeral local port.
pub async fn start_server() -> SocketAddr {
    let (hub, _task) = ChatHub::spawn(SessionController::new(&ChatConfig::default()));
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![],
    };
    WebServer::new(&config, hub)
        .expect("server config")
        .run_with_addr()
        .await
        .expect("server start")
}

/// JSON-over-WebSocket test client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    backlog: VecDeque<Value>,
    next_ack: u64,
}

impl TestClient {
    /// Connect to the relay's WebSocket endpoint.
    pub async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("websocket connect");
        Self {
            ws,
            backlog: VecDeque::new(),
            next_ack: 1,
        }
    }

    /// Connect and join with a display name, discarding the join traffic.
    pub async fn joined(addr: SocketAddr, name: &str) -> (Self, String) {
        let mut client = Self::connect(addr).await;
        let ack = client.emit_with_ack("user:join", json!(name)).await;
        let assigned = ack["assignedName"]
            .as_str()
            .expect("assigned name")
            .to_string();
        client.backlog.clear();
        (client, assigned)
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("send frame");
    }

    /// Send an event without requesting an acknowledgment.
    pub async fn emit(&mut self, event: &str, data: Value) {
        let frame = json!({"event": event, "data": data});
        self.send_raw(&frame.to_string()).await;
    }

    /// Send an event and wait for its acknowledgment payload.
    ///
    /// Frames that arrive before the acknowledgment stay queued for `recv`.
    pub async fn emit_with_ack(&mut self, event: &str, data: Value) -> Value {
        let id = self.next_ack;
        self.next_ack += 1;
        let frame = json!({"event": event, "data": data, "ack": id});
        self.send_raw(&frame.to_string()).await;

        loop {
            let frame = self.read_frame(DEFAULT_TIMEOUT).await.expect("ack frame");
            if frame["event"] == "ack" && frame["id"] == id {
                return frame["data"].clone();
            }
            self.backlog.push_back(frame);
        }
    }

    /// Receive the next frame.
    pub async fn recv(&mut self) -> Value {
        if let Some(frame) = self.backlog.pop_front() {
            return frame;
        }
        self.read_frame(DEFAULT_TIMEOUT).await.expect("frame")
    }

    /// Receive frames until one matches, discarding the rest.
    pub async fn recv_until(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        loop {
            let frame = self.recv().await;
            if pred(&frame) {
                return frame;
            }
        }
    }

    /// Wait for the next `chat:message` payload.
    pub async fn recv_chat(&mut self) -> Value {
        self.recv_until(|f| f["event"] == "chat:message").await["data"].clone()
    }

    /// Wait for the next `users:update` payload.
    pub async fn recv_users(&mut self) -> Vec<String> {
        let frame = self.recv_until(|f| f["event"] == "users:update").await;
        serde_json::from_value(frame["data"].clone()).expect("user list")
    }

    /// Collect every frame that arrives within the silence window.
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut frames: Vec<Value> = self.backlog.drain(..).collect();
        while let Some(frame) = self.read_frame(SILENCE_WINDOW).await {
            frames.push(frame);
        }
        frames
    }

    /// Close the connection.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    async fn read_frame(&mut self, wait: Duration) -> Option<Value> {
        loop {
            let msg = match timeout(wait, self.ws.next()).await {
                Ok(Some(Ok(msg))) => msg,
                _ => return None,
            };
            if let Message::Text(text) = msg {
                return Some(serde_json::from_str(&text).expect("json frame"));
            }
        }
    }
}

/// Chat payloads among a list of frames.
pub fn chat_frames(frames: &[Value]) -> Vec<&Value> {
    frames
        .iter()
        .filter(|f| f["event"] == "chat:message")
        .map(|f| &f["data"])
        .collect()
}
