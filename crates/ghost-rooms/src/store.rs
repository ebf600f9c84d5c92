use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use ghost_crypto::{Codec, CodecError};
use ghost_types::models::{MessageId, MessageStatus, MessageView, Room, RoomId, RoomState};

use crate::error::RoomError;

struct RoomRecord {
    created_at: DateTime<Utc>,
    ttl_secs: u64,
    participants: HashSet<Uuid>,
    messages: Vec<MessageRecord>,
    next_message_id: MessageId,
}

/// Messages are kept sealed; only the flat envelope string is held.
struct MessageRecord {
    id: MessageId,
    sender: String,
    sealed: String,
    timestamp: DateTime<Utc>,
}

/// What was erased when a room left the store.
#[derive(Debug, Clone)]
pub struct RemovedRoom {
    pub room: Room,
    pub messages_erased: usize,
}

/// Volatile room storage. Nothing here is ever written to disk.
///
/// All access goes through [`RoomStore::transaction`], which holds the store
/// mutex for the whole closure: a check and the write that depends on it can
/// never interleave with another caller.
pub struct RoomStore {
    rooms: Mutex<HashMap<RoomId, RoomRecord>>,
    codec: Codec,
}

impl RoomStore {
    pub fn new(codec: Codec) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            codec,
        }
    }

    pub fn transaction<F, T>(&self, f: F) -> Result<T, RoomError>
    where
        F: FnOnce(&mut Rooms<'_>) -> Result<T, RoomError>,
    {
        let mut map = self
            .rooms
            .lock()
            .map_err(|e| RoomError::Unavailable(format!("room store lock poisoned: {}", e)))?;
        let mut rooms = Rooms {
            map: &mut *map,
            codec: &self.codec,
        };
        f(&mut rooms)
    }
}

/// The room table, borrowed for the duration of one transaction.
pub struct Rooms<'a> {
    map: &'a mut HashMap<RoomId, RoomRecord>,
    codec: &'a Codec,
}

impl Rooms<'_> {
    pub fn create(&mut self, ttl_secs: u64, now: DateTime<Utc>) -> Room {
        let id = Uuid::new_v4();
        let record = RoomRecord {
            created_at: now,
            ttl_secs,
            participants: HashSet::new(),
            messages: Vec::new(),
            next_message_id: 1,
        };
        let room = snapshot(id, &record, RoomState::Active);
        self.map.insert(id, record);
        room
    }

    pub fn get(&self, room_id: RoomId) -> Result<Room, RoomError> {
        let record = self.record(room_id)?;
        Ok(snapshot(room_id, record, RoomState::Active))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Seal `plaintext` and append it as the room's next message.
    pub fn append_message(
        &mut self,
        room_id: RoomId,
        sender: &str,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageView, RoomError> {
        let sealed = self.codec.seal(plaintext.as_bytes())?;
        let record = self.record_mut(room_id)?;

        let id = record.next_message_id;
        record.next_message_id += 1;
        record.messages.push(MessageRecord {
            id,
            sender: sender.to_string(),
            sealed,
            timestamp: now,
        });

        Ok(MessageView {
            id,
            sender: sender.to_string(),
            text: plaintext.to_string(),
            timestamp: now,
            status: MessageStatus::Ok,
        })
    }

    /// Open every message of a room in id order. A message that cannot be
    /// opened is returned with a placeholder body instead of failing the read.
    pub fn list_messages(&self, room_id: RoomId) -> Result<Vec<MessageView>, RoomError> {
        let record = self.record(room_id)?;
        Ok(record
            .messages
            .iter()
            .map(|message| open_message(self.codec, room_id, message))
            .collect())
    }

    /// Erase a room and every message it owns in one step.
    /// Returns `None` if the room is already gone.
    pub fn remove(&mut self, room_id: RoomId) -> Option<RemovedRoom> {
        let record = self.map.remove(&room_id)?;
        Some(RemovedRoom {
            room: snapshot(room_id, &record, RoomState::Destroyed),
            messages_erased: record.messages.len(),
        })
    }

    pub fn is_participant(&self, room_id: RoomId, token: Uuid) -> Result<bool, RoomError> {
        Ok(self.record(room_id)?.participants.contains(&token))
    }

    /// Returns the participant count after insertion.
    pub fn add_participant(&mut self, room_id: RoomId, token: Uuid) -> Result<usize, RoomError> {
        let record = self.record_mut(room_id)?;
        record.participants.insert(token);
        Ok(record.participants.len())
    }

    /// Returns whether the token was a participant.
    pub fn remove_participant(&mut self, room_id: RoomId, token: Uuid) -> Result<bool, RoomError> {
        Ok(self.record_mut(room_id)?.participants.remove(&token))
    }

    /// Ids of rooms whose TTL has run out at `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<RoomId> {
        self.map
            .iter()
            .filter(|(id, record)| snapshot(**id, record, RoomState::Active).is_expired(now))
            .map(|(id, _)| *id)
            .collect()
    }

    fn record(&self, room_id: RoomId) -> Result<&RoomRecord, RoomError> {
        self.map.get(&room_id).ok_or(RoomError::NotFound)
    }

    fn record_mut(&mut self, room_id: RoomId) -> Result<&mut RoomRecord, RoomError> {
        self.map.get_mut(&room_id).ok_or(RoomError::NotFound)
    }
}

fn snapshot(id: RoomId, record: &RoomRecord, state: RoomState) -> Room {
    Room {
        id,
        created_at: record.created_at,
        ttl_secs: record.ttl_secs,
        participant_count: record.participants.len(),
        state,
    }
}

fn open_message(codec: &Codec, room_id: RoomId, message: &MessageRecord) -> MessageView {
    let status = match codec.open(&message.sealed).map(String::from_utf8) {
        Ok(Ok(text)) => {
            return MessageView {
                id: message.id,
                sender: message.sender.clone(),
                text,
                timestamp: message.timestamp,
                status: MessageStatus::Ok,
            };
        }
        Ok(Err(_)) => MessageStatus::Corrupted,
        Err(CodecError::Unauthenticated) => MessageStatus::Undecryptable,
        Err(_) => MessageStatus::Corrupted,
    };

    warn!("Message {} in room {} could not be opened: {:?}", message.id, room_id, status);

    MessageView {
        id: message.id,
        sender: message.sender.clone(),
        text: status.placeholder().unwrap_or_default().to_string(),
        timestamp: message.timestamp,
        status,
    }
}
