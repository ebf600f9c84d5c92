//! Local view of one room: countdown plus message list.
//!
//! The server is authoritative for both. The countdown is anchored on a
//! monotonic instant and re-anchored whenever the server reports a fresh TTL;
//! the message list is keyed by id, so duplicated or replayed events are
//! harmless.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use ghost_types::events::GatewayEvent;
use ghost_types::models::{MessageId, MessageView, RoomId};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A participant wiped the room.
    Destroyed,
    /// The room's TTL ran out.
    Expired,
    /// The local caller cancelled.
    Cancelled,
    ConnectionLost,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionEnd::Destroyed => "session terminated",
            SessionEnd::Expired => "session expired",
            SessionEnd::Cancelled => "session closed",
            SessionEnd::ConnectionLost => "connection lost",
        };
        f.write_str(text)
    }
}

/// Outcome of applying one gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// New message appended in order.
    Appended(MessageId),
    /// Already known; nothing changed.
    Duplicate,
    /// A message arrived past a hole in the id sequence. The caller should
    /// refetch the full list.
    Gap { expected: MessageId, got: MessageId },
    Ended(SessionEnd),
    /// Not for this room, or not a room event.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct RoomSession {
    room_id: RoomId,
    messages: BTreeMap<MessageId, MessageView>,
    anchor: Instant,
    anchor_remaining: u64,
    ended: Option<SessionEnd>,
}

impl RoomSession {
    pub fn new(room_id: RoomId, ttl: u64, now: Instant) -> Self {
        let mut session = Self {
            room_id,
            messages: BTreeMap::new(),
            anchor: now,
            anchor_remaining: ttl,
            ended: None,
        };
        if ttl == 0 {
            session.end(SessionEnd::Expired);
        }
        session
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Re-anchor the countdown on a TTL just read from the server.
    pub fn sync_ttl(&mut self, remaining: u64, now: Instant) {
        self.anchor = now;
        self.anchor_remaining = remaining;
        if remaining == 0 {
            self.end(SessionEnd::Expired);
        }
    }

    /// Seconds left according to the local countdown.
    pub fn remaining(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.anchor).as_secs();
        self.anchor_remaining.saturating_sub(elapsed)
    }

    /// `m:ss`, as shown next to the room id.
    pub fn countdown(&self, now: Instant) -> String {
        format_countdown(self.remaining(now))
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageView> {
        self.messages.values()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn last_id(&self) -> Option<MessageId> {
        self.messages.keys().next_back().copied()
    }

    /// Merge a full listing fetched from the server.
    pub fn replace_messages(&mut self, messages: Vec<MessageView>) {
        self.messages = messages.into_iter().map(|m| (m.id, m)).collect();
    }

    pub fn apply(&mut self, event: GatewayEvent, now: Instant) -> Applied {
        if event.room_id() != Some(self.room_id) {
            return Applied::Ignored;
        }
        if let Some(reason) = self.ended {
            return match event {
                GatewayEvent::Destroy { .. } => Applied::Ended(reason),
                _ => Applied::Ignored,
            };
        }

        match event {
            GatewayEvent::Message { message, .. } => {
                if self.messages.contains_key(&message.id) {
                    return Applied::Duplicate;
                }
                let expected = self.last_id().map_or(1, |id| id + 1);
                let got = message.id;
                self.messages.insert(got, message);
                if got > expected {
                    Applied::Gap { expected, got }
                } else {
                    Applied::Appended(got)
                }
            }
            GatewayEvent::Destroy { .. } => {
                // A destroy after the countdown ran out is the expiry itself.
                let reason = if self.remaining(now) == 0 {
                    SessionEnd::Expired
                } else {
                    SessionEnd::Destroyed
                };
                Applied::Ended(self.end(reason))
            }
            _ => Applied::Ignored,
        }
    }

    /// Record the end of the session. The first reason sticks.
    pub fn end(&mut self, reason: SessionEnd) -> SessionEnd {
        *self.ended.get_or_insert(reason)
    }

    pub fn ended(&self) -> Option<SessionEnd> {
        self.ended
    }
}

pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ghost_types::models::MessageStatus;
    use std::time::Duration;
    use uuid::Uuid;

    fn message(id: MessageId) -> MessageView {
        MessageView {
            id,
            sender: "A".into(),
            text: format!("msg {id}"),
            timestamp: Utc::now(),
            status: MessageStatus::Ok,
        }
    }

    fn message_event(room_id: RoomId, id: MessageId) -> GatewayEvent {
        GatewayEvent::Message {
            room_id,
            message: message(id),
        }
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(1800), "30:00");
        assert_eq!(format_countdown(61), "1:01");
        assert_eq!(format_countdown(9), "0:09");
        assert_eq!(format_countdown(0), "0:00");
    }

    #[test]
    fn countdown_follows_monotonic_clock() {
        let start = Instant::now();
        let session = RoomSession::new(Uuid::new_v4(), 90, start);

        assert_eq!(session.remaining(start), 90);
        assert_eq!(session.remaining(start + Duration::from_millis(999)), 90);
        assert_eq!(session.remaining(start + Duration::from_secs(30)), 60);
        assert_eq!(session.countdown(start + Duration::from_secs(30)), "1:00");
        assert_eq!(session.remaining(start + Duration::from_secs(500)), 0);
    }

    #[test]
    fn server_resync_wins() {
        let start = Instant::now();
        let mut session = RoomSession::new(Uuid::new_v4(), 100, start);
        let later = start + Duration::from_secs(10);

        session.sync_ttl(80, later);
        assert_eq!(session.remaining(later), 80);
        assert_eq!(session.remaining(later + Duration::from_secs(5)), 75);
        assert!(session.ended().is_none());

        session.sync_ttl(0, later);
        assert_eq!(session.ended(), Some(SessionEnd::Expired));
    }

    #[test]
    fn in_order_messages_append() {
        let room = Uuid::new_v4();
        let now = Instant::now();
        let mut session = RoomSession::new(room, 60, now);

        assert_eq!(session.apply(message_event(room, 1), now), Applied::Appended(1));
        assert_eq!(session.apply(message_event(room, 2), now), Applied::Appended(2));
        assert_eq!(session.last_id(), Some(2));
    }

    #[test]
    fn duplicate_messages_are_idempotent() {
        let room = Uuid::new_v4();
        let now = Instant::now();
        let mut session = RoomSession::new(room, 60, now);

        session.apply(message_event(room, 1), now);
        assert_eq!(session.apply(message_event(room, 1), now), Applied::Duplicate);
        assert_eq!(session.message_count(), 1);
    }

    #[test]
    fn gap_is_reported() {
        let room = Uuid::new_v4();
        let now = Instant::now();
        let mut session = RoomSession::new(room, 60, now);
        session.replace_messages(vec![message(1)]);

        assert_eq!(
            session.apply(message_event(room, 3), now),
            Applied::Gap { expected: 2, got: 3 }
        );

        session.replace_messages(vec![message(1), message(2), message(3)]);
        let ids: Vec<MessageId> = session.messages().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn other_rooms_ignored() {
        let now = Instant::now();
        let mut session = RoomSession::new(Uuid::new_v4(), 60, now);
        let elsewhere = Uuid::new_v4();

        assert_eq!(session.apply(message_event(elsewhere, 1), now), Applied::Ignored);
        assert_eq!(
            session.apply(GatewayEvent::Destroy { room_id: elsewhere }, now),
            Applied::Ignored
        );
        assert!(session.ended().is_none());
    }

    #[test]
    fn destroy_ends_once() {
        let room = Uuid::new_v4();
        let now = Instant::now();
        let mut session = RoomSession::new(room, 60, now);

        assert_eq!(
            session.apply(GatewayEvent::Destroy { room_id: room }, now),
            Applied::Ended(SessionEnd::Destroyed)
        );
        assert_eq!(
            session.apply(GatewayEvent::Destroy { room_id: room }, now),
            Applied::Ended(SessionEnd::Destroyed)
        );
        assert_eq!(session.apply(message_event(room, 1), now), Applied::Ignored);
        assert_eq!(session.message_count(), 0);
    }

    #[test]
    fn destroy_after_countdown_is_expiry() {
        let room = Uuid::new_v4();
        let start = Instant::now();
        let mut session = RoomSession::new(room, 5, start);

        let applied = session.apply(
            GatewayEvent::Destroy { room_id: room },
            start + Duration::from_secs(5),
        );
        assert_eq!(applied, Applied::Ended(SessionEnd::Expired));
    }

    #[test]
    fn first_end_reason_sticks() {
        let mut session = RoomSession::new(Uuid::new_v4(), 60, Instant::now());
        assert_eq!(session.end(SessionEnd::Cancelled), SessionEnd::Cancelled);
        assert_eq!(session.end(SessionEnd::ConnectionLost), SessionEnd::Cancelled);
    }
}
