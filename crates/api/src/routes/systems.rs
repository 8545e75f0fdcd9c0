use axum::routing::{get, post};
use axum::Router;

use crate::handlers::systems;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/systems", get(systems::list_systems))
        .route(
            "/systems/{id}",
            get(systems::get_system).post(systems::refresh_system),
        )
        .route("/refresh", post(systems::refresh_all))
}
