//! Session lifecycle controller.
//!
//! Owns the identity registry, room directory and outbound queues, and
//! applies every inbound event to them. Each handler mutates state and
//! queues all resulting broadcasts before returning, so callers that apply
//! events one at a time never observe a half-applied event.

use thiserror::Error;

use crate::config::ChatConfig;

use super::directory::{RoomDirectory, RoomError, RoomTarget};
use super::fanout::Fanout;
use super::identity::IdentityRegistry;
use super::message::{Ack, ClientEvent, ConnectionId, Outbound, OutboundSender};
use super::presence::broadcast_presence;
use super::router::{MessageRouter, SenderNames};

/// Error returned to the caller of a session operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `user:join` was sent twice on one connection.
    #[error("Already joined.")]
    AlreadyIdentified,
    /// Room operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Controller for all connections of one relay.
pub struct SessionController {
    identities: IdentityRegistry,
    directory: RoomDirectory,
    fanout: Fanout,
    names: SenderNames,
}

impl SessionController {
    /// Create a controller with an OS-seeded room code generator.
    pub fn new(config: &ChatConfig) -> Self {
        Self::with_directory(config, RoomDirectory::new())
    }

    /// Create a controller around an existing room directory.
    pub fn with_directory(config: &ChatConfig, directory: RoomDirectory) -> Self {
        Self {
            identities: IdentityRegistry::new(config.anonymous_name.clone()),
            directory,
            fanout: Fanout::new(),
            names: SenderNames {
                anonymous: config.anonymous_name.clone(),
                system: config.system_name.clone(),
            },
        }
    }

    /// Register a new connection in the global room.
    pub fn connect(&mut self, connection: ConnectionId, outbound: OutboundSender) {
        self.directory.connect(connection);
        self.fanout.register(connection, outbound);
        tracing::debug!(%connection, "Connection opened");
    }

    /// Apply one inbound event, returning the acknowledgment if the event
    /// has one.
    pub fn handle(&mut self, connection: ConnectionId, event: ClientEvent) -> Option<Ack> {
        tracing::trace!(%connection, event = event.name(), "Handling event");
        match event {
            ClientEvent::UserJoin { name } => Some(match self.join_user(connection, name.as_deref()) {
                Ok(assigned_name) => Ack::Joined { assigned_name },
                Err(e) => Ack::failed(e),
            }),
            ClientEvent::ChatMessage { text, room } => {
                self.send_chat(connection, text.as_deref(), room.as_deref());
                None
            }
            ClientEvent::RoomCreate => Some(match self.create_room(connection) {
                Ok(room_code) => Ack::RoomCreated { room_code },
                Err(e) => Ack::failed(e),
            }),
            ClientEvent::RoomJoin { room_id } => Some(match self.join_room(connection, &room_id) {
                Ok(()) => Ack::Ok,
                Err(e) => Ack::failed(e),
            }),
            ClientEvent::RoomLeave { room_id } => {
                Some(match self.leave_room(connection, &room_id) {
                    Ok(()) => Ack::Ok,
                    Err(e) => Ack::failed(e),
                })
            }
        }
    }

    /// Claim a display name for a connection.
    pub fn join_user(
        &mut self,
        connection: ConnectionId,
        requested: Option<&str>,
    ) -> Result<String, SessionError> {
        if self.identities.contains(connection) {
            tracing::debug!(%connection, "Rejected repeated user:join");
            return Err(SessionError::AlreadyIdentified);
        }

        let name = self.identities.assign(connection, requested);
        tracing::info!(%connection, name = %name, "User joined");

        self.router()
            .system_notify(&RoomTarget::Global, format!("{name} has joined the chat."));
        self.broadcast_presence();
        Ok(name)
    }

    /// Route a chat message from a connection.
    pub fn send_chat(
        &mut self,
        connection: ConnectionId,
        text: Option<&str>,
        room: Option<&str>,
    ) -> usize {
        self.router().route_message(connection, text, room)
    }

    /// Create a room with the connection as its first member.
    pub fn create_room(&mut self, connection: ConnectionId) -> Result<String, SessionError> {
        let code = self.directory.create_room(connection)?;
        self.broadcast_presence();
        Ok(code)
    }

    /// Add a connection to an existing room.
    pub fn join_room(&mut self, connection: ConnectionId, room_id: &str) -> Result<(), SessionError> {
        if let Err(e) = self.directory.join_room(connection, room_id) {
            tracing::debug!(%connection, room_id, error = %e, "Room join rejected");
            return Err(e.into());
        }

        let name = self.display_name(connection);
        self.router().system_notify(
            &RoomTarget::Room(room_id.to_string()),
            format!("{name} has joined the room."),
        );
        self.broadcast_presence();
        Ok(())
    }

    /// Remove a connection from one room.
    pub fn leave_room(&mut self, connection: ConnectionId, room_id: &str) -> Result<(), SessionError> {
        let remaining = self.directory.leave_room(connection, room_id)?;

        if remaining > 0 {
            let name = self.display_name(connection);
            self.router().system_notify(
                &RoomTarget::Room(room_id.to_string()),
                format!("{name} has left the room."),
            );
        }
        self.broadcast_presence();
        Ok(())
    }

    /// Tear down a connection: leave every room, release its name and
    /// refresh presence for everyone else.
    ///
    /// Connections that never joined produce no announcements.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.fanout.unregister(connection);
        let left = self.directory.leave_all(connection);
        let name = self.identities.release(connection);

        if let Some(name) = &name {
            for room in left.iter().filter(|room| !room.deleted()) {
                self.router().system_notify(
                    &RoomTarget::Room(room.room_id.clone()),
                    format!("{name} has left the room."),
                );
            }
        }

        self.directory.remove_connection(connection);

        if let Some(name) = &name {
            self.router()
                .system_notify(&RoomTarget::Global, format!("{name} has left the chat."));
        }
        self.broadcast_presence();

        tracing::debug!(
            %connection,
            name = name.as_deref().unwrap_or(""),
            rooms_left = left.len(),
            "Connection closed"
        );
    }

    /// Queue an acknowledgment for the connection that sent an event.
    pub fn acknowledge(&self, connection: ConnectionId, id: u64, ack: Ack) -> bool {
        self.fanout.send(connection, Outbound::Ack { id, ack })
    }

    /// The identity registry.
    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    /// The room directory.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    fn display_name(&self, connection: ConnectionId) -> String {
        self.identities
            .get(connection)
            .unwrap_or(self.names.anonymous.as_str())
            .to_string()
    }

    fn router(&self) -> MessageRouter<'_> {
        MessageRouter::new(&self.identities, &self.directory, &self.fanout, &self.names)
    }

    fn broadcast_presence(&self) -> usize {
        broadcast_presence(&self.identities, &self.directory, &self.fanout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{ChatEvent, OutboundReceiver};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    fn controller() -> SessionController {
        SessionController::with_directory(
            &ChatConfig::default(),
            RoomDirectory::with_rng(StdRng::seed_from_u64(42)),
        )
    }

    fn connect(ctl: &mut SessionController) -> (ConnectionId, OutboundReceiver) {
        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        ctl.connect(conn, tx);
        (conn, rx)
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<Outbound> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn chats(events: &[Outbound]) -> Vec<&ChatEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                Outbound::Chat(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn last_users(events: &[Outbound]) -> Option<Vec<String>> {
        events.iter().rev().find_map(|e| match e {
            Outbound::Users(u) => Some(u.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_join_user_announces_and_updates_presence() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (_b, mut rx_b) = connect(&mut ctl);

        assert_eq!(ctl.join_user(a, Some("alice")), Ok("alice".to_string()));

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(events.len(), 2);
            match &events[0] {
                Outbound::Chat(c) => {
                    assert!(c.is_system);
                    assert_eq!(c.text, "alice has joined the chat.");
                }
                other => panic!("Expected system message, got {other:?}"),
            }
            assert_eq!(events[1], Outbound::Users(vec!["alice".to_string()]));
        }
    }

    #[test]
    fn test_join_user_twice_rejected() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        drain(&mut rx_a);

        assert_eq!(
            ctl.join_user(a, Some("other")),
            Err(SessionError::AlreadyIdentified)
        );
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(ctl.identities().snapshot(), vec!["alice"]);
    }

    #[test]
    fn test_handle_acks() {
        let mut ctl = controller();
        let (a, _rx_a) = connect(&mut ctl);

        let ack = ctl.handle(a, ClientEvent::UserJoin { name: None });
        assert_eq!(
            ack,
            Some(Ack::Joined {
                assigned_name: "anonymous".to_string()
            })
        );

        let ack = ctl.handle(
            a,
            ClientEvent::ChatMessage {
                text: Some("hi".into()),
                room: None,
            },
        );
        assert!(ack.is_none());

        let code = match ctl.handle(a, ClientEvent::RoomCreate) {
            Some(Ack::RoomCreated { room_code }) => room_code,
            other => panic!("Expected RoomCreated, got {other:?}"),
        };

        let ack = ctl.handle(a, ClientEvent::RoomJoin { room_id: code.clone() });
        assert_eq!(ack, Some(Ack::failed("Room not found or already joined.")));

        let ack = ctl.handle(a, ClientEvent::RoomLeave { room_id: code });
        assert_eq!(ack, Some(Ack::Ok));
    }

    #[test]
    fn test_create_room_refreshes_presence() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        drain(&mut rx_a);

        let code = ctl.create_room(a).unwrap();
        assert!(ctl.directory().room(&code).unwrap().is_member(a));

        let events = drain(&mut rx_a);
        assert_eq!(events, vec![Outbound::Users(vec!["alice".to_string()])]);
    }

    #[test]
    fn test_join_room_notifies_room_only() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, mut rx_b) = connect(&mut ctl);
        let (c, mut rx_c) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        ctl.join_user(b, Some("bob")).unwrap();
        ctl.join_user(c, Some("carol")).unwrap();
        let code = ctl.create_room(a).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        ctl.join_room(b, &code).unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            let chats = chats(&events);
            assert_eq!(chats.len(), 1);
            assert_eq!(chats[0].text, "bob has joined the room.");
            assert_eq!(chats[0].room.as_deref(), Some(code.as_str()));
        }
        let events = drain(&mut rx_c);
        assert!(chats(&events).is_empty());
        assert!(last_users(&events).is_some());
    }

    #[test]
    fn test_join_room_failure_has_no_side_effects() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        drain(&mut rx_a);

        assert_eq!(
            ctl.join_room(a, "0000"),
            Err(SessionError::Room(RoomError::NotFound))
        );
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn test_leave_room_announces_to_remaining() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, mut rx_b) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        ctl.join_user(b, Some("bob")).unwrap();
        let code = ctl.create_room(a).unwrap();
        ctl.join_room(b, &code).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        ctl.leave_room(b, &code).unwrap();

        let events = drain(&mut rx_a);
        assert_eq!(chats(&events)[0].text, "bob has left the room.");
        assert!(chats(&drain(&mut rx_b)).is_empty());

        ctl.leave_room(a, &code).unwrap();
        assert!(ctl.directory().room(&code).is_none());
        assert_eq!(
            ctl.join_room(b, &code),
            Err(SessionError::Room(RoomError::NotFound))
        );
    }

    #[test]
    fn test_leave_room_not_member() {
        let mut ctl = controller();
        let (a, _rx_a) = connect(&mut ctl);
        assert_eq!(
            ctl.leave_room(a, "1234"),
            Err(SessionError::Room(RoomError::NotMember))
        );
    }

    #[test]
    fn test_disconnect_identified() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, mut rx_b) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        ctl.join_user(b, Some("bob")).unwrap();
        let code = ctl.create_room(a).unwrap();
        ctl.join_room(b, &code).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        ctl.disconnect(b);

        let events = drain(&mut rx_a);
        let texts: Vec<_> = chats(&events).iter().map(|c| c.text.clone()).collect();
        assert_eq!(texts, vec!["bob has left the room.", "bob has left the chat."]);
        assert_eq!(last_users(&events), Some(vec!["alice".to_string()]));

        assert_eq!(ctl.directory().room(&code).unwrap().member_count(), 1);
        assert!(!ctl.directory().is_connected(b));
        assert!(!ctl.identities().contains(b));

        ctl.send_chat(a, Some("anyone?"), None);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_disconnect_last_member_deletes_room() {
        let mut ctl = controller();
        let (a, _rx_a) = connect(&mut ctl);
        let (b, mut rx_b) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        ctl.join_user(b, Some("bob")).unwrap();
        let code = ctl.create_room(a).unwrap();
        drain(&mut rx_b);

        ctl.disconnect(a);

        assert!(ctl.directory().room(&code).is_none());
        let events = drain(&mut rx_b);
        let texts: Vec<_> = chats(&events).iter().map(|c| c.text.clone()).collect();
        assert_eq!(texts, vec!["alice has left the chat."]);
    }

    #[test]
    fn test_disconnect_unidentified() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, _rx_b) = connect(&mut ctl);
        ctl.join_user(a, Some("alice")).unwrap();
        drain(&mut rx_a);

        ctl.disconnect(b);

        let events = drain(&mut rx_a);
        assert!(chats(&events).is_empty());
        assert_eq!(events, vec![Outbound::Users(vec!["alice".to_string()])]);
    }

    #[test]
    fn test_disconnect_twice_is_harmless() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, _rx_b) = connect(&mut ctl);
        ctl.join_user(b, Some("bob")).unwrap();
        drain(&mut rx_a);

        ctl.disconnect(b);
        ctl.disconnect(b);

        let events = drain(&mut rx_a);
        assert_eq!(chats(&events).len(), 1);
        assert_eq!(last_users(&events), Some(vec![]));
    }

    #[test]
    fn test_room_actions_before_join_use_placeholder() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, _rx_b) = connect(&mut ctl);
        let code = ctl.create_room(a).unwrap();
        drain(&mut rx_a);

        ctl.join_room(b, &code).unwrap();

        let events = drain(&mut rx_a);
        assert_eq!(chats(&events)[0].text, "anonymous has joined the room.");
    }

    #[test]
    fn test_acknowledge_queues_ack() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);

        assert!(ctl.acknowledge(a, 7, Ack::Ok));
        assert_eq!(drain(&mut rx_a), vec![Outbound::Ack { id: 7, ack: Ack::Ok }]);
        assert!(!ctl.acknowledge(ConnectionId::new(), 8, Ack::Ok));
    }

    #[test]
    fn test_reference_scenario() {
        let mut ctl = controller();
        let (a, mut rx_a) = connect(&mut ctl);
        let (b, mut rx_b) = connect(&mut ctl);
        let (c, mut rx_c) = connect(&mut ctl);

        assert_eq!(ctl.join_user(a, Some("alice")).unwrap(), "alice");
        assert_eq!(ctl.join_user(b, Some("alice")).unwrap(), "alice#2");
        ctl.join_user(c, Some("carol")).unwrap();

        let room = ctl.create_room(a).unwrap();
        ctl.join_room(b, &room).unwrap();

        let stale = (room.parse::<u32>().unwrap() + 1).to_string();
        let result = ctl.handle(c, ClientEvent::RoomJoin { room_id: stale });
        assert_eq!(result, Some(Ack::failed("Room not found or already joined.")));

        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        ctl.send_chat(a, Some("hi"), Some(&room));
        assert_eq!(chats(&drain(&mut rx_a))[0].text, "hi");
        assert_eq!(chats(&drain(&mut rx_b))[0].text, "hi");
        assert!(drain(&mut rx_c).is_empty());

        ctl.disconnect(b);
        let members: Vec<_> = ctl.directory().room(&room).unwrap().members().collect();
        assert_eq!(members, vec![a]);

        let expected = Some(vec!["alice".to_string(), "carol".to_string()]);
        assert_eq!(last_users(&drain(&mut rx_a)), expected);
        assert_eq!(last_users(&drain(&mut rx_c)), expected);
    }
}
