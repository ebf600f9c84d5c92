//! Participant-side adapter: HTTP calls, the gateway subscription, and the
//! reconciled local view of a room.

pub mod error;
pub mod http;
pub mod realtime;
pub mod runner;
pub mod session;

pub use error::ClientError;
pub use http::RoomClient;
pub use realtime::RealtimeConnection;
pub use runner::run_session;
pub use session::{Applied, RoomSession, SessionEnd, format_countdown};
