use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MessageView, RoomId};

/// Names a subscriber can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    Message,
    Destroy,
}

impl EventName {
    pub fn all() -> Vec<EventName> {
        vec![EventName::Message, EventName::Destroy]
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the subscription is live; every later event for these
    /// rooms will be delivered.
    Subscribed { room_ids: Vec<RoomId> },

    /// A new message was committed to a room
    Message { room_id: RoomId, message: MessageView },

    /// The room was destroyed (expired or wiped by a participant)
    Destroy { room_id: RoomId },

    /// A command from the client could not be handled
    Error { reason: String },
}

impl GatewayEvent {
    /// Returns the room this event belongs to, if it is a room event.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::Message { room_id, .. } | Self::Destroy { room_id } => Some(*room_id),
            // Subscribed and Error are connection-local
            _ => None,
        }
    }

    pub fn name(&self) -> Option<EventName> {
        match self {
            Self::Message { .. } => Some(EventName::Message),
            Self::Destroy { .. } => Some(EventName::Destroy),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Replace this connection's subscription. `events` defaults to every event.
    /// `token` must belong to a participant of every listed room.
    Subscribe {
        room_ids: Vec<RoomId>,
        #[serde(default = "EventName::all")]
        events: Vec<EventName>,
        #[serde(default)]
        token: Option<Uuid>,
    },

    /// Drop the current subscription.
    Unsubscribe,
}
