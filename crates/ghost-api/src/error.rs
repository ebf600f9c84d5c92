//! API error type.
//!
//! Every failure leaves the server as `{"error": {"code", "message"}}`.
//! Internal details are logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use ghost_rooms::RoomError;
use ghost_types::api::{ErrorDetail, ErrorResponse, error_code};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Missing, malformed or foreign participant token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Request body could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Room(RoomError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Room(RoomError::RoomFull) => StatusCode::CONFLICT,
            ApiError::Room(RoomError::InvalidMessage(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Room(RoomError::NotParticipant) | ApiError::InvalidToken(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Room(RoomError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Room(RoomError::Codec(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            ApiError::Room(RoomError::NotFound) => (
                error_code::ROOM_NOT_FOUND,
                "Room not found or already destroyed".to_string(),
            ),
            ApiError::Room(RoomError::RoomFull) => (
                error_code::ROOM_FULL,
                "Room is at maximum capacity".to_string(),
            ),
            ApiError::Room(RoomError::InvalidMessage(reason)) => {
                (error_code::INVALID_MESSAGE, reason.clone())
            }
            ApiError::BadRequest(reason) => (error_code::INVALID_MESSAGE, reason.clone()),
            ApiError::Room(RoomError::NotParticipant) => (
                error_code::INVALID_TOKEN,
                "Token does not belong to this room".to_string(),
            ),
            ApiError::InvalidToken(reason) => (error_code::INVALID_TOKEN, reason.clone()),
            ApiError::Room(RoomError::Unavailable(reason)) => {
                warn!("Room store unavailable: {}", reason);
                (
                    error_code::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            ApiError::Room(RoomError::Codec(e)) => {
                error!("Message encryption failed: {}", e);
                (
                    error_code::INTERNAL_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_crypto::CodecError;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn room_errors_map_to_codes() {
        let cases = [
            (RoomError::NotFound, StatusCode::NOT_FOUND, error_code::ROOM_NOT_FOUND),
            (RoomError::RoomFull, StatusCode::CONFLICT, error_code::ROOM_FULL),
            (
                RoomError::InvalidMessage("text must not be blank".into()),
                StatusCode::BAD_REQUEST,
                error_code::INVALID_MESSAGE,
            ),
            (RoomError::NotParticipant, StatusCode::BAD_REQUEST, error_code::INVALID_TOKEN),
            (
                RoomError::Unavailable("poisoned".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                error_code::SERVICE_UNAVAILABLE,
            ),
            (
                RoomError::Codec(CodecError::Encryption),
                StatusCode::INTERNAL_SERVER_ERROR,
                error_code::INTERNAL_ERROR,
            ),
        ];

        for (err, status, code) in cases {
            let (got_status, body) = body_of(ApiError::from(err)).await;
            assert_eq!(got_status, status);
            assert_eq!(body.error.code, code);
        }
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (_, body) = body_of(RoomError::Unavailable("room store lock poisoned".into()).into()).await;
        assert!(!body.error.message.contains("poisoned"));
    }

    #[tokio::test]
    async fn validation_reason_is_returned() {
        let (_, body) = body_of(RoomError::InvalidMessage("text must not be blank".into()).into()).await;
        assert_eq!(body.error.message, "text must not be blank");
    }
}
