//! Background tasks.
//!
//! The [`Scheduler`] owns its own worker task and is started and stopped
//! explicitly by the binary.

pub mod scheduler;

pub use scheduler::{Scheduler, TickOutcome};
