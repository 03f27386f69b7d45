//! Web server for the chat relay.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::chat::HubHandle;
use crate::config::ServerConfig;
use crate::{RelayError, Result};

use super::router::create_router;
use super::ws::ChatWsState;

/// HTTP/WebSocket server in front of the session hub.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// WebSocket handler state.
    ws_state: Arc<ChatWsState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, hub: HubHandle) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse::<SocketAddr>()
            .map_err(|e| RelayError::Config(format!("invalid listen address: {e}")))?;

        Ok(Self {
            addr,
            ws_state: Arc::new(ChatWsState::new(hub)),
            cors_origins: config.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> Result<()> {
        let router = create_router(self.ws_state, &self.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Chat relay listening on http://{}", local_addr);

        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = create_router(self.ws_state, &self.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Chat relay listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
