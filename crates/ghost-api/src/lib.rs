//! HTTP and websocket surface for ephemeral rooms.

pub mod error;
pub mod messages;
pub mod middleware;
pub mod realtime;
pub mod rooms;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
