pub mod health;
pub mod systems;

use axum::routing::get;
use axum::Router;

use crate::sse;
use crate::state::AppState;

/// Routes that stream indefinitely and must not sit behind the request
/// timeout.
///
/// ```text
/// GET /events     -> sse::events_handler
/// ```
pub fn streaming_routes() -> Router<AppState> {
    Router::new().route("/events", get(sse::events_handler))
}

/// Request/response routes, mounted under `/api`.
///
/// ```text
/// GET  /health             -> health_check
/// GET  /systems            -> list_systems
/// GET  /systems/{id}       -> get_system
/// POST /systems/{id}       -> refresh_system
/// POST /refresh            -> refresh_all
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(systems::router())
}
