//! Room directory: global membership and ephemeral sub-rooms.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::message::ConnectionId;

/// Reserved identifier for the global room.
pub const GLOBAL_ROOM: &str = "global";

/// Smallest room code.
const MIN_ROOM_CODE: u32 = 1000;

/// Largest room code.
const MAX_ROOM_CODE: u32 = 9999;

/// Number of distinct room codes.
const ROOM_CODE_SPACE: usize = (MAX_ROOM_CODE - MIN_ROOM_CODE + 1) as usize;

/// Error from a room membership operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// No room with the given code exists.
    #[error("Room not found or already joined.")]
    NotFound,
    /// The connection is already a member.
    #[error("Room not found or already joined.")]
    AlreadyMember,
    /// The room does not exist or the connection is not a member.
    #[error("Room not found or not joined.")]
    NotMember,
    /// Every room code is in use.
    #[error("No room codes available.")]
    CodesExhausted,
}

/// Delivery target resolved from an optional room ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomTarget {
    /// Every connected connection.
    Global,
    /// Members of one room.
    Room(String),
}

impl RoomTarget {
    /// Room code, or None for the global room.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            RoomTarget::Global => None,
            RoomTarget::Room(id) => Some(id),
        }
    }
}

/// An ephemeral room.
#[derive(Debug, Clone)]
pub struct Room {
    id: String,
    creator: ConnectionId,
    members: IndexSet<ConnectionId>,
    created_at: DateTime<Utc>,
}

impl Room {
    fn new(id: String, creator: ConnectionId) -> Self {
        let mut members = IndexSet::new();
        members.insert(creator);
        Self {
            id,
            creator,
            members,
            created_at: Utc::now(),
        }
    }

    /// Room code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connection that created the room.
    pub fn creator(&self) -> ConnectionId {
        self.creator
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current members in join order.
    pub fn members(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members.iter().copied()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether a connection is a member.
    pub fn is_member(&self, connection: ConnectionId) -> bool {
        self.members.contains(&connection)
    }
}

/// A room a connection was removed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftRoom {
    /// Room code.
    pub room_id: String,
    /// Members left afterwards. Zero means the room was deleted.
    pub remaining: usize,
}

impl LeftRoom {
    /// Whether the room was deleted because it became empty.
    pub fn deleted(&self) -> bool {
        self.remaining == 0
    }
}

/// Tracks the global room and every ephemeral room.
///
/// A non-global room exists only while it has at least one member.
pub struct RoomDirectory {
    connected: IndexSet<ConnectionId>,
    rooms: BTreeMap<String, Room>,
    rng: StdRng,
}

impl RoomDirectory {
    /// Create an empty directory with an OS-seeded code generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Create an empty directory with the given code generator.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            connected: IndexSet::new(),
            rooms: BTreeMap::new(),
            rng,
        }
    }

    /// Add a connection to the global room.
    ///
    /// Returns false if it was already connected.
    pub fn connect(&mut self, connection: ConnectionId) -> bool {
        self.connected.insert(connection)
    }

    /// Remove a connection from the global room.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> bool {
        self.connected.shift_remove(&connection)
    }

    /// Whether a connection is in the global room.
    pub fn is_connected(&self, connection: ConnectionId) -> bool {
        self.connected.contains(&connection)
    }

    /// Number of connections in the global room.
    pub fn connection_count(&self) -> usize {
        self.connected.len()
    }

    /// Create a room with `creator` as its only member and return its code.
    pub fn create_room(&mut self, creator: ConnectionId) -> Result<String, RoomError> {
        if self.rooms.len() >= ROOM_CODE_SPACE {
            return Err(RoomError::CodesExhausted);
        }

        let code = loop {
            let candidate = self
                .rng
                .random_range(MIN_ROOM_CODE..=MAX_ROOM_CODE)
                .to_string();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        self.rooms
            .insert(code.clone(), Room::new(code.clone(), creator));
        tracing::info!(room_id = %code, creator = %creator, "Room created");
        Ok(code)
    }

    /// Add a connection to an existing room.
    pub fn join_room(&mut self, connection: ConnectionId, room_id: &str) -> Result<(), RoomError> {
        let room = self.rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        if !room.members.insert(connection) {
            return Err(RoomError::AlreadyMember);
        }
        Ok(())
    }

    /// Remove a connection from one room, deleting the room if it empties.
    ///
    /// Returns the number of members left.
    pub fn leave_room(&mut self, connection: ConnectionId, room_id: &str) -> Result<usize, RoomError> {
        let room = self.rooms.get_mut(room_id).ok_or(RoomError::NotMember)?;
        if !room.members.shift_remove(&connection) {
            return Err(RoomError::NotMember);
        }

        let remaining = room.members.len();
        if remaining == 0 {
            self.rooms.remove(room_id);
            tracing::info!(room_id, "Room deleted");
        }
        Ok(remaining)
    }

    /// Remove a connection from every room it belongs to.
    ///
    /// Rooms that become empty are deleted. Results are ordered by room code.
    pub fn leave_all(&mut self, connection: ConnectionId) -> Vec<LeftRoom> {
        let mut left = Vec::new();
        for room in self.rooms.values_mut() {
            if room.members.shift_remove(&connection) {
                left.push(LeftRoom {
                    room_id: room.id.clone(),
                    remaining: room.members.len(),
                });
            }
        }

        self.rooms.retain(|id, room| {
            let keep = !room.members.is_empty();
            if !keep {
                tracing::info!(room_id = %id, "Room deleted");
            }
            keep
        });
        left
    }

    /// Resolve an optional room ID to a delivery target.
    ///
    /// Unknown IDs and the reserved global ID resolve to the global room.
    pub fn resolve(&self, room_id: Option<&str>) -> RoomTarget {
        match room_id {
            Some(id) if id != GLOBAL_ROOM && self.rooms.contains_key(id) => {
                RoomTarget::Room(id.to_string())
            }
            _ => RoomTarget::Global,
        }
    }

    /// Connections that a broadcast to `target` reaches.
    pub fn members_of(&self, target: &RoomTarget) -> Vec<ConnectionId> {
        match target {
            RoomTarget::Global => self.connected.iter().copied().collect(),
            RoomTarget::Room(id) => self
                .rooms
                .get(id)
                .map(|room| room.members().collect())
                .unwrap_or_default(),
        }
    }

    /// Get a room by code.
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Codes of the rooms a connection belongs to.
    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<String> {
        self.rooms
            .values()
            .filter(|room| room.is_member(connection))
            .map(|room| room.id.clone())
            .collect()
    }

    /// Number of ephemeral rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
