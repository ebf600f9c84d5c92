use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use ghost_types::api::{MessagesResponse, SendMessageRequest, SendMessageResponse};

use crate::error::ApiError;
use crate::middleware::{ParticipantToken, RoomPath};
use crate::state::AppState;

/// Send a message. Without a token the sender is admitted first, and the
/// token it was given comes back in the response.
pub async fn send_message(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Extension(token): Extension<ParticipantToken>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let sent = state
        .lifecycle
        .send(room_id, token.0, &req.sender, &req.text)?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            id: sent.message.id,
            token: sent.token,
        }),
    ))
}

/// The room's history. Only a participant may read it.
pub async fn get_messages(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Extension(token): Extension<ParticipantToken>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = state.lifecycle.messages(room_id, token.required()?)?;
    Ok(Json(MessagesResponse { messages }))
}
