use thiserror::Error;

use ghost_crypto::CodecError;
use ghost_types::models::ROOM_CAPACITY;

#[derive(Debug, Error)]
pub enum RoomError {
    /// The room never existed, expired, or was destroyed. Terminal for that id.
    #[error("room not found or already destroyed")]
    NotFound,

    /// The room already holds its maximum number of participants.
    #[error("room is at maximum capacity ({ROOM_CAPACITY}/{ROOM_CAPACITY})")]
    RoomFull,

    #[error("token does not belong to a participant of this room")]
    NotParticipant,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The store cannot serve requests right now; safe to retry.
    #[error("room store unavailable: {0}")]
    Unavailable(String),

    #[error("message encryption failed: {0}")]
    Codec(#[from] CodecError),
}
