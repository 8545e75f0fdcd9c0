//! Server-sent events for live dashboard updates.
//!
//! Provides the subscriber registry ([`Broadcaster`]), the keep-alive
//! heartbeat, and the streaming handler mounted at `/api/events`.

pub mod broadcaster;
mod handler;
mod heartbeat;

pub use broadcaster::{Broadcaster, Subscriber};
pub use handler::events_handler;
pub use heartbeat::start_heartbeat;
