use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use ghost_gateway::{Membership, connection};

use crate::state::AppState;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher().clone();
    let membership: Arc<dyn Membership> = Arc::new(state.lifecycle.clone());
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, membership))
}
