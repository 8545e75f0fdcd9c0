//! Integration tests for the system status and refresh endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, build_test_state, eventually, get, post};

// ---------------------------------------------------------------------------
// Test: GET /api/systems before any check has run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_systems_with_empty_cache() {
    let app = build_test_app(build_test_state());
    let response = get(app, "/api/systems").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["systems"], serde_json::json!([]));
    assert_eq!(json["count"], 0);
    assert_eq!(json["cached"], true);
    assert_eq!(json["stale"], true);
}

// ---------------------------------------------------------------------------
// Test: GET /api/systems returns cached states in registration order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_systems_returns_cached_states_in_order() {
    let state = build_test_state();
    state.orchestrator.warm_cache().await;

    let json = body_json(get(build_test_app(state), "/api/systems").await).await;

    assert_eq!(json["count"], 2);
    assert_eq!(json["stale"], false);
    assert_eq!(json["systems"][0]["id"], "alpha");
    assert_eq!(json["systems"][0]["status"], "ok");
    assert_eq!(json["systems"][0]["type"], "web");
    assert_eq!(json["systems"][1]["id"], "beta");
    assert_eq!(json["systems"][1]["status"], "error");
    assert_eq!(json["systems"][1]["checks"][0]["status"], "error");
}

// ---------------------------------------------------------------------------
// Test: GET /api/systems marks activity
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn list_systems_marks_activity() {
    let state = build_test_state();
    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    assert!(state.scheduler.is_idle().await);

    get(build_test_app(state.clone()), "/api/systems").await;

    assert!(!state.scheduler.is_idle().await);
}

// ---------------------------------------------------------------------------
// Test: POST /api/refresh answers 202 and fills the cache in the background
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_all_is_accepted_and_runs() {
    let state = build_test_state();
    let response = post(build_test_app(state.clone()), "/api/refresh").await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Refresh started");
    assert_eq!(json["status"], "processing");
    assert!(json.get("system_id").is_none());

    let cache = state.cache.clone();
    assert!(
        eventually(|| {
            let cache = cache.clone();
            async move { cache.count().await == 2 }
        })
        .await
    );
}

// ---------------------------------------------------------------------------
// Test: POST /api/systems/{id} refreshes only that system
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_one_system_is_accepted_and_runs() {
    let state = build_test_state();
    let response = post(build_test_app(state.clone()), "/api/systems/beta").await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["system_id"], "beta");
    assert_eq!(json["status"], "processing");

    let cache = state.cache.clone();
    assert!(
        eventually(|| {
            let cache = cache.clone();
            async move { cache.get("beta").await.is_some() }
        })
        .await
    );
    assert!(state.cache.get("alpha").await.is_none());
}

// ---------------------------------------------------------------------------
// Test: POST /api/systems/{id} with an unknown id is still accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_unknown_system_is_accepted_without_writes() {
    let state = build_test_state();
    let mut subscriber = state.broadcaster.subscribe().await;

    let response = post(build_test_app(state.clone()), "/api/systems/nope").await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["system_id"], "nope");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.cache.count().await, 0);
    assert!(subscriber.try_recv().is_none());
}

// ---------------------------------------------------------------------------
// Test: GET /api/systems/{id} returns one cached state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_system_returns_cached_state() {
    let state = build_test_state();
    state.orchestrator.refresh_one("beta").await;

    let response = get(build_test_app(state), "/api/systems/beta").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "beta");
    assert_eq!(json["environment"], "preprod");
    assert_eq!(json["status"], "error");
}

// ---------------------------------------------------------------------------
// Test: GET /api/systems/{id} distinguishes unknown from not yet checked
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_system_errors_use_json_envelope() {
    let state = build_test_state();

    let unknown = get(build_test_app(state.clone()), "/api/systems/nope").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(unknown).await["code"], "NOT_FOUND");

    let pending = get(build_test_app(state), "/api/systems/alpha").await;
    assert_eq!(pending.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(pending).await["code"], "NOT_CHECKED");
}
