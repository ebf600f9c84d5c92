use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::debug;

use ghost_types::api::{CreateRoomResponse, JoinResponse, TtlResponse};

use crate::error::ApiError;
use crate::middleware::{ParticipantToken, RoomPath};
use crate::state::AppState;

pub async fn create_room(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let room = state.lifecycle.create_room()?;
    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            room_id: room.id,
            ttl: room.ttl_secs,
        }),
    ))
}

pub async fn get_ttl(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
) -> Result<Json<TtlResponse>, ApiError> {
    let ttl = state.lifecycle.ttl(room_id)?;
    Ok(Json(TtlResponse { ttl }))
}

pub async fn join_room(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Extension(token): Extension<ParticipantToken>,
) -> Result<Json<JoinResponse>, ApiError> {
    let admission = state.lifecycle.join(room_id, token.0)?;
    Ok(Json(JoinResponse {
        token: admission.token,
        participants: admission.participants,
    }))
}

pub async fn leave_room(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Extension(token): Extension<ParticipantToken>,
) -> Result<StatusCode, ApiError> {
    let remaining = state.lifecycle.leave(room_id, token.required()?)?;
    debug!("Room {} has {} participants after leave", room_id, remaining);
    Ok(StatusCode::NO_CONTENT)
}

/// Wipe the room. Any participant may do this; there is no quorum.
pub async fn destroy_room(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Extension(token): Extension<ParticipantToken>,
) -> Result<StatusCode, ApiError> {
    state.lifecycle.destroy(room_id, token.required()?)?;
    Ok(StatusCode::NO_CONTENT)
}
