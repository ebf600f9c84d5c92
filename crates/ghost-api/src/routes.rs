use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::participant_token;
use crate::state::AppState;
use crate::{messages, realtime, rooms};

pub fn router(state: AppState) -> Router {
    let room_routes = Router::new()
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/{room_id}", delete(rooms::destroy_room))
        .route("/rooms/{room_id}/ttl", get(rooms::get_ttl))
        .route("/rooms/{room_id}/join", post(rooms::join_room))
        .route("/rooms/{room_id}/leave", post(rooms::leave_room))
        .route(
            "/rooms/{room_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .layer(middleware::from_fn(participant_token))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(realtime::ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(room_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
