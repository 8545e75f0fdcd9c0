use std::sync::Arc;
use std::time::Duration;

use statusboard_core::ProbeRegistry;

use crate::background::Scheduler;
use crate::cache::StatusCache;
use crate::config::{AppConfig, ServerConfig};
use crate::engine::Orchestrator;
use crate::sse::Broadcaster;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every component sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Age after which cached entries are reported stale.
    pub cache_max_age: Duration,
    pub cache: Arc<StatusCache>,
    pub broadcaster: Arc<Broadcaster>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Wire the cache, broadcaster, orchestrator and scheduler around
    /// `registry`. Nothing is started.
    pub fn new(config: &AppConfig, registry: ProbeRegistry) -> Self {
        let cache = Arc::new(StatusCache::new());
        let broadcaster = Arc::new(Broadcaster::with_capacity(config.sse.queue_capacity));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(registry),
            Arc::clone(&cache),
            Arc::clone(&broadcaster),
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&orchestrator),
            config.scheduler.interval,
            config.scheduler.idle_timeout,
        ));

        Self {
            config: Arc::new(config.server.clone()),
            cache_max_age: config.cache.max_age,
            cache,
            broadcaster,
            orchestrator,
            scheduler,
        }
    }
}
