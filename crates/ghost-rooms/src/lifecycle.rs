//! Room lifecycle: `Active` until the TTL runs out or a participant wipes the
//! room, then `Destroyed` (erased) for good.
//!
//! Every operation runs inside one store transaction. Expiry is checked lazily
//! at the start of each transaction, and [`Lifecycle::sweep`] catches rooms
//! nobody touches. Destruction is a compare-and-transition on the store: the
//! first caller to remove the room publishes the single `destroy` event, any
//! racing caller finds nothing to remove.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use ghost_crypto::Codec;
use ghost_gateway::{Dispatcher, Membership};
use ghost_types::api::{MAX_SENDER_LEN, MAX_TEXT_LEN};
use ghost_types::events::GatewayEvent;
use ghost_types::models::{MessageView, Room, RoomId};

use crate::clock::{Clock, SystemClock};
use crate::error::RoomError;
use crate::store::{RoomStore, Rooms};

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub token: Uuid,
    pub participants: usize,
    /// False when the token already belonged to the room.
    pub newly_joined: bool,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: MessageView,
    pub token: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    Expired,
    Wiped,
}

#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    store: RoomStore,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    room_ttl_secs: u64,
}

impl Lifecycle {
    pub fn new(codec: Codec, dispatcher: Dispatcher, room_ttl_secs: u64) -> Self {
        Self::with_clock(codec, dispatcher, room_ttl_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(
        codec: Codec,
        dispatcher: Dispatcher,
        room_ttl_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                store: RoomStore::new(codec),
                dispatcher,
                clock,
                room_ttl_secs,
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn room_ttl_secs(&self) -> u64 {
        self.inner.room_ttl_secs
    }

    /// Number of rooms currently held. Does not trigger expiry.
    pub fn room_count(&self) -> Result<usize, RoomError> {
        self.inner.store.transaction(|rooms| Ok(rooms.len()))
    }

    pub fn create_room(&self) -> Result<Room, RoomError> {
        self.create_room_with_ttl(self.inner.room_ttl_secs)
    }

    pub fn create_room_with_ttl(&self, ttl_secs: u64) -> Result<Room, RoomError> {
        let now = self.inner.clock.now();
        let room = self
            .inner
            .store
            .transaction(|rooms| Ok(rooms.create(ttl_secs, now)))?;
        info!("Room {} created (ttl {}s)", room.id, room.ttl_secs);
        Ok(room)
    }

    /// Current snapshot of a live room.
    pub fn room(&self, room_id: RoomId) -> Result<Room, RoomError> {
        self.inner
            .store
            .transaction(|rooms| self.live(rooms, room_id))
    }

    /// Seconds until the room self-destructs.
    ///
    /// The read that first sees the countdown at zero gets `0` back and
    /// destroys the room; every later read gets `NotFound`.
    pub fn ttl(&self, room_id: RoomId) -> Result<u64, RoomError> {
        let now = self.inner.clock.now();
        self.inner.store.transaction(|rooms| {
            let remaining = rooms.get(room_id)?.remaining_secs(now);
            if remaining == 0 {
                self.finish(rooms, room_id, DestroyReason::Expired);
            }
            Ok(remaining)
        })
    }

    /// Admit a participant. Presenting a token already in the room re-joins
    /// without taking a second slot; anything else needs a free slot.
    pub fn join(&self, room_id: RoomId, token: Option<Uuid>) -> Result<Admission, RoomError> {
        self.inner.store.transaction(|rooms| {
            self.live(rooms, room_id)?;
            let admission = admit(rooms, room_id, token)?;
            if admission.newly_joined {
                info!(
                    "Participant joined room {} ({}/2)",
                    room_id, admission.participants
                );
            }
            Ok(admission)
        })
    }

    /// Release a participant's slot. Returns the remaining participant count.
    pub fn leave(&self, room_id: RoomId, token: Uuid) -> Result<usize, RoomError> {
        self.inner.store.transaction(|rooms| {
            self.live(rooms, room_id)?;
            if !rooms.remove_participant(room_id, token)? {
                return Err(RoomError::NotParticipant);
            }
            let remaining = rooms.get(room_id)?.participant_count;
            info!("Participant left room {} ({}/2)", room_id, remaining);
            Ok(remaining)
        })
    }

    /// Seal and append a message, then fan it out to the room's subscribers.
    ///
    /// A sender without a valid token is admitted first, so a third party
    /// gets `RoomFull` rather than a write.
    pub fn send(
        &self,
        room_id: RoomId,
        token: Option<Uuid>,
        sender: &str,
        text: &str,
    ) -> Result<SentMessage, RoomError> {
        validate_message(sender, text)?;
        let now = self.inner.clock.now();

        self.inner.store.transaction(|rooms| {
            self.live(rooms, room_id)?;
            let admission = admit(rooms, room_id, token)?;

            let message = match rooms.append_message(room_id, sender, text, now) {
                Ok(message) => message,
                Err(e) => {
                    if admission.newly_joined {
                        rooms.remove_participant(room_id, admission.token)?;
                    }
                    return Err(e);
                }
            };

            // Published under the store lock so a later destroy cannot overtake it.
            self.inner.dispatcher.publish(GatewayEvent::Message {
                room_id,
                message: message.clone(),
            });
            debug!("Message {} appended to room {}", message.id, room_id);

            Ok(SentMessage {
                message,
                token: admission.token,
            })
        })
    }

    /// All messages of a live room, decrypted, in id order. Only a
    /// participant may read them.
    pub fn messages(&self, room_id: RoomId, token: Uuid) -> Result<Vec<MessageView>, RoomError> {
        self.inner.store.transaction(|rooms| {
            self.live(rooms, room_id)?;
            if !rooms.is_participant(room_id, token)? {
                return Err(RoomError::NotParticipant);
            }
            rooms.list_messages(room_id)
        })
    }

    /// Participant-initiated wipe. `NotFound` if the room is already gone.
    pub fn destroy(&self, room_id: RoomId, token: Uuid) -> Result<(), RoomError> {
        self.inner.store.transaction(|rooms| {
            if !rooms.is_participant(room_id, token)? {
                return Err(RoomError::NotParticipant);
            }
            if self.finish(rooms, room_id, DestroyReason::Wiped) {
                Ok(())
            } else {
                Err(RoomError::NotFound)
            }
        })
    }

    /// Whether `token` belongs to a current participant of a live room.
    pub fn is_participant(&self, room_id: RoomId, token: Uuid) -> Result<bool, RoomError> {
        self.inner.store.transaction(|rooms| {
            self.live(rooms, room_id)?;
            rooms.is_participant(room_id, token)
        })
    }

    /// Destroy the room if its TTL has run out. Returns whether this call did it.
    pub fn expire(&self, room_id: RoomId) -> Result<bool, RoomError> {
        let now = self.inner.clock.now();
        self.inner.store.transaction(|rooms| match rooms.get(room_id) {
            Ok(room) if room.is_expired(now) => {
                Ok(self.finish(rooms, room_id, DestroyReason::Expired))
            }
            Ok(_) | Err(RoomError::NotFound) => Ok(false),
            Err(e) => Err(e),
        })
    }

    /// Destroy every expired room. Returns how many were destroyed.
    pub fn sweep(&self) -> Result<usize, RoomError> {
        let now = self.inner.clock.now();
        self.inner.store.transaction(|rooms| {
            let destroyed = rooms
                .expired(now)
                .into_iter()
                .filter(|room_id| self.finish(rooms, *room_id, DestroyReason::Expired))
                .count();
            Ok(destroyed)
        })
    }

    /// Fetch a room, destroying it first if its TTL has run out.
    fn live(&self, rooms: &mut Rooms<'_>, room_id: RoomId) -> Result<Room, RoomError> {
        let room = rooms.get(room_id)?;
        if room.is_expired(self.inner.clock.now()) {
            self.finish(rooms, room_id, DestroyReason::Expired);
            return Err(RoomError::NotFound);
        }
        Ok(room)
    }

    /// The `Active -> Destroyed` transition. Only the caller that actually
    /// removes the room emits `destroy`.
    fn finish(&self, rooms: &mut Rooms<'_>, room_id: RoomId, reason: DestroyReason) -> bool {
        let Some(removed) = rooms.remove(room_id) else {
            return false;
        };
        let notified = self
            .inner
            .dispatcher
            .publish(GatewayEvent::Destroy { room_id });
        info!(
            "Room {} destroyed ({:?}): {} messages erased, {} subscribers notified",
            room_id, reason, removed.messages_erased, notified
        );
        true
    }
}

impl Membership for Lifecycle {
    fn is_member(&self, room_id: RoomId, token: Uuid) -> bool {
        self.is_participant(room_id, token).unwrap_or(false)
    }
}

fn admit(rooms: &mut Rooms<'_>, room_id: RoomId, token: Option<Uuid>) -> Result<Admission, RoomError> {
    if let Some(token) = token {
        if rooms.is_participant(room_id, token)? {
            return Ok(Admission {
                token,
                participants: rooms.get(room_id)?.participant_count,
                newly_joined: false,
            });
        }
    }

    if rooms.get(room_id)?.is_full() {
        debug!("Join rejected, room {} is full", room_id);
        return Err(RoomError::RoomFull);
    }

    // Tokens are always minted here; an unknown token is not adopted.
    let token = Uuid::new_v4();
    let participants = rooms.add_participant(room_id, token)?;
    Ok(Admission {
        token,
        participants,
        newly_joined: true,
    })
}

fn validate_message(sender: &str, text: &str) -> Result<(), RoomError> {
    if sender.trim().is_empty() || sender.chars().count() > MAX_SENDER_LEN {
        return Err(RoomError::InvalidMessage(format!(
            "sender must be 1-{MAX_SENDER_LEN} characters"
        )));
    }
    if text.trim().is_empty() {
        return Err(RoomError::InvalidMessage("text must not be blank".into()));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(RoomError::InvalidMessage(format!(
            "text must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}
