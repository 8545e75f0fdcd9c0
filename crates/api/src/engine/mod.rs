//! Check execution engine.
//!
//! Runs the registered probe sets concurrently and routes the aggregated
//! states to the status cache and SSE subscribers.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
