use ghost_types::models::RoomId;
use uuid::Uuid;

/// Answers whether a token belongs to a current participant of a room.
///
/// The gateway asks this before registering a subscription, so only
/// participants receive a room's events.
pub trait Membership: Send + Sync {
    fn is_member(&self, room_id: RoomId, token: Uuid) -> bool;
}
