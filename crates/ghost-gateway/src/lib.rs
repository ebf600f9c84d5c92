pub mod connection;
pub mod dispatcher;
pub mod membership;

pub use dispatcher::{Dispatcher, Subscription};
pub use membership::Membership;
