//! Ephemeral two-party rooms: volatile storage, the lifecycle state machine
//! and the background expiry sweep.

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RoomError;
pub use lifecycle::{Admission, DestroyReason, Lifecycle, SentMessage};
pub use sweeper::run_expiry_sweep;
