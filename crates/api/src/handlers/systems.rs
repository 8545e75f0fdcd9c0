//! Handlers for the system status endpoints.
//!
//! Refresh endpoints are fire-and-forget: they spawn the check pass and
//! answer `202 Accepted` immediately. Results arrive over `/api/events`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use statusboard_core::{CoreError, SystemState};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body of `GET /api/systems`.
#[derive(Debug, Serialize)]
pub struct SystemsResponse {
    pub systems: Vec<SystemState>,
    pub cached: bool,
    pub count: usize,
    /// True if any registered system is missing or older than the max age.
    pub stale: bool,
}

/// Receipt returned by the refresh endpoints.
#[derive(Debug, Serialize)]
pub struct RefreshAccepted {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/systems
///
/// Cached states in registration order. Systems not checked yet are omitted.
pub async fn list_systems(State(state): State<AppState>) -> Json<SystemsResponse> {
    state.scheduler.mark_activity().await;

    let registry = state.orchestrator.registry();
    let mut systems = Vec::with_capacity(registry.len());
    for id in registry.ids() {
        if let Some(system) = state.cache.get(id).await {
            systems.push(system);
        }
    }
    let stale = state
        .cache
        .any_stale(registry.ids(), state.cache_max_age)
        .await;

    Json(SystemsResponse {
        count: systems.len(),
        systems,
        cached: true,
        stale,
    })
}

/// GET /api/systems/{id}
///
/// The cached state of one system.
pub async fn get_system(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SystemState>> {
    state.scheduler.mark_activity().await;

    if state.orchestrator.registry().get(&id).is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "System",
            id,
        }));
    }
    match state.cache.get(&id).await {
        Some(system) => Ok(Json(system)),
        None => Err(AppError::NotChecked(id)),
    }
}

/// POST /api/refresh
///
/// Starts a progressive pass over every system.
pub async fn refresh_all(State(state): State<AppState>) -> (StatusCode, Json<RefreshAccepted>) {
    state.scheduler.mark_activity().await;

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.run_all_progressive().await;
    });
    tracing::info!("Manual refresh of all systems started");

    (
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            message: "Refresh started",
            system_id: None,
            status: "processing",
        }),
    )
}

/// POST /api/systems/{id}
///
/// Starts a pass over one system. Always accepted; an unknown id is only
/// logged.
pub async fn refresh_system(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<RefreshAccepted>) {
    state.scheduler.mark_activity().await;

    let orchestrator = Arc::clone(&state.orchestrator);
    let system_id = id.clone();
    tokio::spawn(async move {
        orchestrator.refresh_one(&system_id).await;
    });
    tracing::info!(system_id = %id, "Manual refresh of one system started");

    (
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            message: "Refresh started",
            system_id: Some(id),
            status: "processing",
        }),
    )
}
