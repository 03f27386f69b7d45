//! Session hub: the single event loop that serializes all connections.
//!
//! Every transport task forwards its inbound events here. The hub applies
//! them one at a time to the [`SessionController`], so each event and all of
//! the broadcasts it causes complete before the next event starts.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{RelayError, Result};

use super::message::{ClientEvent, ConnectionId, OutboundSender};
use super::session::SessionController;

/// Command queued for the hub.
#[derive(Debug)]
pub enum HubCommand {
    /// A transport connection opened.
    Connect {
        /// New connection.
        connection: ConnectionId,
        /// Its outbound queue.
        outbound: OutboundSender,
    },
    /// An inbound event arrived on a connection.
    Event {
        /// Source connection.
        connection: ConnectionId,
        /// Decoded event.
        event: ClientEvent,
        /// Acknowledgment ID requested by the client.
        ack: Option<u64>,
    },
    /// A transport connection closed.
    Disconnect {
        /// Closed connection.
        connection: ConnectionId,
    },
}

/// Cloneable handle for submitting commands to the hub.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Register a new connection and return its ID.
    pub fn connect(&self, outbound: OutboundSender) -> Result<ConnectionId> {
        let connection = ConnectionId::new();
        self.submit(HubCommand::Connect {
            connection,
            outbound,
        })?;
        Ok(connection)
    }

    /// Forward an inbound event.
    pub fn dispatch(
        &self,
        connection: ConnectionId,
        event: ClientEvent,
        ack: Option<u64>,
    ) -> Result<()> {
        self.submit(HubCommand::Event {
            connection,
            event,
            ack,
        })
    }

    /// Report that a connection closed.
    pub fn disconnect(&self, connection: ConnectionId) -> Result<()> {
        self.submit(HubCommand::Disconnect { connection })
    }

    fn submit(&self, command: HubCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RelayError::HubClosed)
    }
}

/// The hub task state.
pub struct ChatHub {
    controller: SessionController,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl ChatHub {
    /// Create a hub and the handle that feeds it.
    pub fn new(controller: SessionController) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            controller,
            commands: rx,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Spawn the hub on the tokio runtime.
    ///
    /// The task ends once every [`HubHandle`] has been dropped.
    pub fn spawn(controller: SessionController) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(controller);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Process commands until all handles are dropped.
    pub async fn run(mut self) {
        tracing::debug!("Session hub started");
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::debug!("Session hub stopped");
    }

    /// Apply a single command.
    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect {
                connection,
                outbound,
            } => self.controller.connect(connection, outbound),
            HubCommand::Event {
                connection,
                event,
                ack,
            } => {
                let result = self.controller.handle(connection, event);
                if let (Some(id), Some(result)) = (ack, result) {
                    self.controller.acknowledge(connection, id, result);
                }
            }
            HubCommand::Disconnect { connection } => self.controller.disconnect(connection),
        }
    }

    /// The controller driven by this hub.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }
}
