use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MessageId, MessageView, RoomId};

// -- Rooms --

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
    pub ttl: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TtlResponse {
    pub ttl: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    /// Participant token; present it as `Authorization: Bearer <token>`.
    pub token: Uuid,
    pub participants: usize,
}

// -- Messages --

pub const MAX_SENDER_LEN: usize = 100;
pub const MAX_TEXT_LEN: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub id: MessageId,
    pub token: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

// -- Errors --

pub mod error_code {
    pub const ROOM_FULL: &str = "ROOM_FULL";
    pub const ROOM_NOT_FOUND: &str = "ROOM_NOT_FOUND";
    pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
