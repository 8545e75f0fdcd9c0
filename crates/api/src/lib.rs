//! Statusboard API server library.
//!
//! Exposes the building blocks (config, state, cache, live updates,
//! orchestration, scheduling, routes) so integration tests and the binary
//! entrypoint can both access them.

pub mod background;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod routes;
pub mod sse;
pub mod state;
