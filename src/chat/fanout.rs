//! Outbound queues for connected clients.

use std::collections::HashMap;

use super::message::{ConnectionId, Outbound, OutboundSender};

/// Holds the outbound queue of every live connection and fans events out.
///
/// Delivery is fire-and-forget: a queue whose receiver is gone is skipped.
#[derive(Default)]
pub struct Fanout {
    outboxes: HashMap<ConnectionId, OutboundSender>,
}

impl Fanout {
    /// Create an empty fanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outbound queue of a connection.
    pub fn register(&mut self, connection: ConnectionId, sender: OutboundSender) {
        self.outboxes.insert(connection, sender);
    }

    /// Drop the outbound queue of a connection.
    pub fn unregister(&mut self, connection: ConnectionId) -> bool {
        self.outboxes.remove(&connection).is_some()
    }

    /// Queue an event for one connection.
    ///
    /// Returns true if the event was queued.
    pub fn send(&self, connection: ConnectionId, event: Outbound) -> bool {
        match self.outboxes.get(&connection) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Queue an event for every listed connection.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn deliver(&self, members: &[ConnectionId], event: &Outbound) -> usize {
        members
            .iter()
            .filter(|connection| self.send(**connection, event.clone()))
            .count()
    }

    /// Number of registered queues.
    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    /// Whether no queues are registered.
    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }
}
