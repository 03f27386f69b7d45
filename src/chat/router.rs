//! Chat message routing.

use super::directory::{RoomDirectory, RoomTarget};
use super::fanout::Fanout;
use super::identity::IdentityRegistry;
use super::message::{ChatEvent, ConnectionId, Outbound};

/// Sender names used by the router.
#[derive(Debug, Clone)]
pub struct SenderNames {
    /// Name for senders without an identity.
    pub anonymous: String,
    /// Name attached to system announcements.
    pub system: String,
}

/// Routes chat messages and system announcements to one delivery group.
pub struct MessageRouter<'a> {
    identities: &'a IdentityRegistry,
    directory: &'a RoomDirectory,
    fanout: &'a Fanout,
    names: &'a SenderNames,
}

impl<'a> MessageRouter<'a> {
    /// Create a router over the current session state.
    pub fn new(
        identities: &'a IdentityRegistry,
        directory: &'a RoomDirectory,
        fanout: &'a Fanout,
        names: &'a SenderNames,
    ) -> Self {
        Self {
            identities,
            directory,
            fanout,
            names,
        }
    }

    /// Deliver a user message to the target room, or globally when the
    /// target is absent or unknown.
    ///
    /// Blank or missing text is dropped silently. Returns the number of
    /// connections the message was queued for.
    pub fn route_message(
        &self,
        sender: ConnectionId,
        text: Option<&str>,
        target_room: Option<&str>,
    ) -> usize {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            tracing::trace!(%sender, "Dropping empty chat message");
            return 0;
        };

        let username = self
            .identities
            .get(sender)
            .unwrap_or(self.names.anonymous.as_str());
        let target = self.directory.resolve(target_room);
        let event = ChatEvent::new(username, text, target.room_id().map(str::to_string));
        self.deliver(&target, event)
    }

    /// Broadcast a system announcement to a delivery group.
    pub fn system_notify(&self, target: &RoomTarget, text: impl Into<String>) -> usize {
        let event = ChatEvent::system(
            self.names.system.as_str(),
            text,
            target.room_id().map(str::to_string),
        );
        self.deliver(target, event)
    }

    fn deliver(&self, target: &RoomTarget, event: ChatEvent) -> usize {
        let members = self.directory.members_of(target);
        self.fanout.deliver(&members, &Outbound::Chat(event))
    }
}
