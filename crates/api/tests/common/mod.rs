#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use statusboard_core::{CheckResult, Probe, ProbeRegistry, Severity, SystemDefinition};
use tower::ServiceExt;

use statusboard_api::background::Scheduler;
use statusboard_api::cache::StatusCache;
use statusboard_api::config::ServerConfig;
use statusboard_api::engine::Orchestrator;
use statusboard_api::router::build_app_router;
use statusboard_api::sse::Broadcaster;
use statusboard_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Probe that returns a fixed severity.
pub struct StubProbe {
    pub id: &'static str,
    pub severity: Severity,
}

#[async_trait]
impl Probe for StubProbe {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn name(&self) -> &str {
        "Stub"
    }

    async fn check(&self) -> CheckResult {
        CheckResult::new(self.id, "http", "Stub", self.severity, "stubbed")
    }
}

/// Registry with one healthy system (`alpha`) and one failing system (`beta`).
pub fn test_registry() -> ProbeRegistry {
    let mut registry = ProbeRegistry::new();
    registry
        .register(
            SystemDefinition::new("alpha", "Alpha", "web", "prod").with_probe(StubProbe {
                id: "http-check",
                severity: Severity::Ok,
            }),
        )
        .unwrap();
    registry
        .register(
            SystemDefinition::new("beta", "Beta", "web", "preprod").with_probe(StubProbe {
                id: "http-check",
                severity: Severity::Error,
            }),
        )
        .unwrap();
    registry
}

/// Application state over [`test_registry`] with real components.
pub fn build_test_state() -> AppState {
    let cache = Arc::new(StatusCache::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(test_registry()),
        Arc::clone(&cache),
        Arc::clone(&broadcaster),
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&orchestrator),
        Duration::from_secs(300),
        Duration::from_secs(900),
    ));

    AppState {
        config: Arc::new(test_config()),
        cache_max_age: Duration::from_secs(600),
        cache,
        broadcaster,
        orchestrator,
        scheduler,
    }
}

/// Build the full application router, sharing `state` with the caller.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config()).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::post(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
