use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use uuid::Uuid;

use ghost_types::events::{EventName, GatewayCommand, GatewayEvent};
use ghost_types::models::RoomId;

use crate::error::ClientError;

/// A gateway connection with a live subscription.
pub struct RealtimeConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    room_ids: Vec<RoomId>,
}

impl RealtimeConnection {
    /// Connect and subscribe with a participant token. Returns only once the
    /// server has acknowledged the subscription, so every event published
    /// afterwards will arrive.
    pub async fn connect(
        url: &str,
        room_ids: Vec<RoomId>,
        token: Uuid,
    ) -> Result<Self, ClientError> {
        let (mut socket, _) = connect_async(url).await?;

        let subscribe = GatewayCommand::Subscribe {
            room_ids,
            events: EventName::all(),
            token: Some(token),
        };
        let text = serde_json::to_string(&subscribe)
            .map_err(|e| ClientError::Protocol(format!("encode subscribe: {e}")))?;
        socket.send(Message::Text(text.into())).await?;

        let mut conn = Self {
            socket,
            room_ids: Vec::new(),
        };
        match conn.next_event().await? {
            Some(GatewayEvent::Subscribed { room_ids }) => {
                debug!("Subscribed to {} rooms", room_ids.len());
                conn.room_ids = room_ids;
                Ok(conn)
            }
            Some(GatewayEvent::Error { reason }) => Err(ClientError::Protocol(reason)),
            Some(other) => Err(ClientError::Protocol(format!(
                "expected subscription ack, got {other:?}"
            ))),
            None => Err(ClientError::Protocol("gateway closed before ack".into())),
        }
    }

    pub fn room_ids(&self) -> &[RoomId] {
        &self.room_ids
    }

    /// Next event from the gateway. `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Result<Option<GatewayEvent>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => match serde_json::from_str(text.as_str()) {
                    Ok(event) => return Ok(Some(event)),
                    Err(e) => warn!("Ignoring unparseable gateway frame: {}", e),
                },
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}
