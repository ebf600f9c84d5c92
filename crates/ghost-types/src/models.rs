use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rooms are addressed by a random v4 UUID. The same id names the realtime channel.
pub type RoomId = Uuid;

/// Per-room sequence number. Starts at 1 and defines the total order of a room.
pub type MessageId = u64;

/// Maximum number of participants admitted to a room.
pub const ROOM_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Active,
    Destroyed,
}

/// Snapshot of a room as seen by a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub participant_count: usize,
    pub state: RoomState,
}

impl Room {
    /// Seconds left before the room self-destructs, computed from creation
    /// time so every reader agrees. Clamped to `[0, ttl_secs]`.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.created_at).num_seconds().max(0) as u64;
        self.ttl_secs.saturating_sub(elapsed)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == 0
    }

    pub fn is_full(&self) -> bool {
        self.participant_count >= ROOM_CAPACITY
    }
}

/// Outcome of opening one stored envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Ok,
    /// The stored envelope (or the plaintext inside it) is not well formed.
    Corrupted,
    /// The envelope is well formed but did not authenticate under the current key.
    Undecryptable,
}

impl MessageStatus {
    /// Text shown in place of a message body that could not be opened.
    pub fn placeholder(self) -> Option<&'static str> {
        match self {
            Self::Ok => None,
            Self::Corrupted => Some("Message Corrupted"),
            Self::Undecryptable => Some("Message Encrypted (Cannot Decrypt)"),
        }
    }
}

/// A decrypted message as delivered to participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn room(ttl_secs: u64) -> Room {
        Room {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            ttl_secs,
            participant_count: 0,
            state: RoomState::Active,
        }
    }

    #[test]
    fn remaining_counts_down_from_creation() {
        let room = room(1800);
        assert_eq!(room.remaining_secs(room.created_at), 1800);
        assert_eq!(room.remaining_secs(room.created_at + Duration::milliseconds(999)), 1800);
        assert_eq!(room.remaining_secs(room.created_at + Duration::seconds(61)), 1739);
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let room = room(10);
        assert_eq!(room.remaining_secs(room.created_at + Duration::seconds(10)), 0);
        assert_eq!(room.remaining_secs(room.created_at + Duration::hours(5)), 0);
        assert!(room.is_expired(room.created_at + Duration::seconds(10)));
    }

    #[test]
    fn clock_behind_creation_does_not_extend_ttl() {
        let room = room(10);
        assert_eq!(room.remaining_secs(room.created_at - Duration::seconds(30)), 10);
    }

    #[test]
    fn remaining_is_non_increasing() {
        let room = room(5);
        let mut last = u64::MAX;
        for ms in (0..7000).step_by(250) {
            let now = room.created_at + Duration::milliseconds(ms);
            let remaining = room.remaining_secs(now);
            assert!(remaining <= last);
            last = remaining;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn placeholders() {
        assert_eq!(MessageStatus::Ok.placeholder(), None);
        assert_eq!(MessageStatus::Corrupted.placeholder(), Some("Message Corrupted"));
        assert_eq!(
            MessageStatus::Undecryptable.placeholder(),
            Some("Message Encrypted (Cannot Decrypt)")
        );
    }
}
