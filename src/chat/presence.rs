//! Global presence list broadcasting.

use super::directory::{RoomDirectory, RoomTarget};
use super::fanout::Fanout;
use super::identity::IdentityRegistry;
use super::message::Outbound;

/// Send the current list of display names to every connection in the
/// global room.
///
/// Presence is global only; room membership is not reflected. Returns the
/// number of connections the update was queued for.
pub fn broadcast_presence(
    identities: &IdentityRegistry,
    directory: &RoomDirectory,
    fanout: &Fanout,
) -> usize {
    let members = directory.members_of(&RoomTarget::Global);
    let update = Outbound::Users(identities.snapshot());
    let delivered = fanout.deliver(&members, &update);
    tracing::trace!(users = identities.len(), delivered, "Presence broadcast");
    delivered
}
