use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use ghost_types::api::{
    CreateRoomResponse, ErrorResponse, JoinResponse, MessagesResponse, SendMessageRequest,
    SendMessageResponse, TtlResponse, error_code,
};
use ghost_types::models::{MessageView, RoomId};

use crate::error::ClientError;

/// Thin typed wrapper over the room HTTP API.
#[derive(Debug, Clone)]
pub struct RoomClient {
    http: reqwest::Client,
    base_url: String,
}

impl RoomClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The websocket gateway on the same host.
    pub fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/gateway")
    }

    pub async fn create_room(&self) -> Result<CreateRoomResponse, ClientError> {
        self.json(self.http.post(self.url("/rooms"))).await
    }

    pub async fn ttl(&self, room_id: RoomId) -> Result<u64, ClientError> {
        let body: TtlResponse = self
            .json(self.http.get(self.url(&format!("/rooms/{room_id}/ttl"))))
            .await?;
        Ok(body.ttl)
    }

    pub async fn join(
        &self,
        room_id: RoomId,
        token: Option<Uuid>,
    ) -> Result<JoinResponse, ClientError> {
        let req = self.http.post(self.url(&format!("/rooms/{room_id}/join")));
        self.json(with_token(req, token)).await
    }

    pub async fn leave(&self, room_id: RoomId, token: Uuid) -> Result<(), ClientError> {
        let req = self
            .http
            .post(self.url(&format!("/rooms/{room_id}/leave")))
            .bearer_auth(token);
        check(req.send().await?).await?;
        Ok(())
    }

    pub async fn send_message(
        &self,
        room_id: RoomId,
        token: Option<Uuid>,
        sender: &str,
        text: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let req = self
            .http
            .post(self.url(&format!("/rooms/{room_id}/messages")))
            .json(&SendMessageRequest {
                sender: sender.to_string(),
                text: text.to_string(),
            });
        self.json(with_token(req, token)).await
    }

    pub async fn messages(
        &self,
        room_id: RoomId,
        token: Uuid,
    ) -> Result<Vec<MessageView>, ClientError> {
        let req = self
            .http
            .get(self.url(&format!("/rooms/{room_id}/messages")))
            .bearer_auth(token);
        let body: MessagesResponse = self.json(req).await?;
        Ok(body.messages)
    }

    pub async fn destroy(&self, room_id: RoomId, token: Uuid) -> Result<(), ClientError> {
        let req = self
            .http
            .delete(self.url(&format!("/rooms/{room_id}")))
            .bearer_auth(token);
        check(req.send().await?).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = check(req.send().await?).await?;
        Ok(response.json().await?)
    }
}

fn with_token(req: RequestBuilder, token: Option<Uuid>) -> RequestBuilder {
    match token {
        Some(token) => req.bearer_auth(token),
        None => req,
    }
}

/// Turn a non-success response into the matching [`ClientError`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let (code, message) = match response.json::<ErrorResponse>().await {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => (String::new(), status.to_string()),
    };

    Err(match code.as_str() {
        error_code::ROOM_NOT_FOUND => ClientError::RoomGone,
        error_code::ROOM_FULL => ClientError::RoomFull,
        _ => ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_url_follows_scheme() {
        assert_eq!(
            RoomClient::new("http://127.0.0.1:3000/").gateway_url(),
            "ws://127.0.0.1:3000/gateway"
        );
        assert_eq!(
            RoomClient::new("https://ghost.example").gateway_url(),
            "wss://ghost.example/gateway"
        );
    }

    #[test]
    fn trailing_slash_trimmed() {
        let client = RoomClient::new("http://localhost:3000///");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/rooms"), "http://localhost:3000/rooms");
    }
}
