//! Concurrent execution of probe passes.
//!
//! Every monitored system runs as its own Tokio task, and every probe
//! inside a system runs as its own task too. A probe that panics only
//! affects its own [`CheckResult`]; sibling probes and other systems are
//! never cancelled. A probe that outlives [`PROBE_TIMEOUT`] is aborted and
//! reported as an error.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use statusboard_core::{CheckResult, ProbeRegistry, Severity, SystemDefinition, SystemState};

use crate::cache::StatusCache;
use crate::sse::Broadcaster;

/// Upper bound on one probe, above every probe's own network timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs probe passes and routes their results to the cache and viewers.
pub struct Orchestrator {
    registry: Arc<ProbeRegistry>,
    cache: Arc<StatusCache>,
    broadcaster: Arc<Broadcaster>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProbeRegistry>,
        cache: Arc<StatusCache>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            registry,
            cache,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Run one complete probe pass for `definition`.
    ///
    /// Probes run concurrently; results keep registration order.
    pub async fn check_system(definition: Arc<SystemDefinition>) -> SystemState {
        let deadline = tokio::time::Instant::now() + PROBE_TIMEOUT;
        let handles: Vec<_> = definition
            .probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                tokio::spawn(async move { probe.check().await })
            })
            .collect();

        let mut checks = Vec::with_capacity(handles.len());
        for (probe, mut handle) in definition.probes.iter().zip(handles) {
            let joined = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    tracing::warn!(
                        system_id = %definition.id,
                        probe = probe.id(),
                        timeout_secs = PROBE_TIMEOUT.as_secs(),
                        "Probe timed out"
                    );
                    checks.push(probe.failure(format!(
                        "Probe did not finish within {}s",
                        PROBE_TIMEOUT.as_secs()
                    )));
                    continue;
                }
            };
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        system_id = %definition.id,
                        probe = probe.id(),
                        error = %e,
                        "Probe task failed"
                    );
                    probe.failure(format!("Probe failed unexpectedly: {e}"))
                }
            };
            checks.push(result);
        }

        SystemState::from_checks(&definition, checks)
    }

    /// Check every registered system concurrently and return all states in
    /// registration order. Nothing is cached or published.
    pub async fn run_all(&self) -> Vec<SystemState> {
        let tasks: Vec<_> = self
            .registry
            .systems()
            .iter()
            .map(|definition| {
                let definition = Arc::clone(definition);
                (
                    Arc::clone(&definition),
                    tokio::spawn(Self::check_system(definition)),
                )
            })
            .collect();

        let mut states = Vec::with_capacity(tasks.len());
        for (definition, handle) in tasks {
            states.push(match handle.await {
                Ok(state) => state,
                Err(e) => internal_failure(&definition, &e.to_string()),
            });
        }
        states
    }

    /// Check every system concurrently, caching and publishing each state as
    /// soon as its pass finishes, then publish one `check_complete` event.
    ///
    /// Returns the number of systems updated.
    pub async fn run_all_progressive(&self) -> usize {
        let mut pending: FuturesUnordered<_> = self
            .registry
            .systems()
            .iter()
            .map(|definition| {
                let definition = Arc::clone(definition);
                let cache = Arc::clone(&self.cache);
                let broadcaster = Arc::clone(&self.broadcaster);
                tokio::spawn(async move {
                    let state = Self::check_system(definition).await;
                    cache.set(&state.id, state.clone()).await;
                    broadcaster.publish_system(&state).await;
                    tracing::info!(system_id = %state.id, status = ?state.status, "System updated");
                })
            })
            .collect();

        let mut updated = 0;
        while let Some(joined) = pending.next().await {
            match joined {
                Ok(()) => updated += 1,
                Err(e) => tracing::error!(error = %e, "System check task failed"),
            }
        }

        self.broadcaster.publish_check_complete().await;
        tracing::info!(updated, "All checks completed");
        updated
    }

    /// Check a single system. `None` if `id` is not registered.
    pub async fn run_one(&self, id: &str) -> Option<SystemState> {
        let definition = Arc::clone(self.registry.get(id)?);
        Some(Self::check_system(definition).await)
    }

    /// Check a single system, then cache and publish its state.
    ///
    /// `None` (and no writes) if `id` is not registered.
    pub async fn refresh_one(&self, id: &str) -> Option<SystemState> {
        let Some(state) = self.run_one(id).await else {
            tracing::warn!(system_id = %id, "Refresh requested for unknown system");
            return None;
        };
        self.cache.set(&state.id, state.clone()).await;
        self.broadcaster.publish_system(&state).await;
        tracing::info!(system_id = %id, status = ?state.status, "Manual refresh completed");
        Some(state)
    }

    /// Run every system and store the results without publishing.
    ///
    /// Used to warm the cache at startup.
    pub async fn warm_cache(&self) -> usize {
        let states = self.run_all().await;
        let count = states.len();
        for state in states {
            self.cache.set(&state.id, state.clone()).await;
        }
        count
    }
}

fn internal_failure(definition: &SystemDefinition, error: &str) -> SystemState {
    tracing::error!(system_id = %definition.id, error, "System check task failed");
    SystemState::from_checks(
        definition,
        vec![CheckResult::new(
            "orchestrator",
            "internal",
            "Check execution",
            Severity::Error,
            format!("System check failed unexpectedly: {error}"),
        )],
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use statusboard_core::{Probe, SystemStatus};

    use super::*;
    use crate::sse::broadcaster::{EVENT_CHECK_COMPLETE, EVENT_SYSTEM_UPDATE};

    struct Fixed {
        severity: Severity,
        delay: Duration,
    }

    #[async_trait]
    impl Probe for Fixed {
        fn id(&self) -> &str {
            "fixed"
        }
        fn kind(&self) -> &str {
            "http"
        }
        fn name(&self) -> &str {
            "Fixed"
        }
        async fn check(&self) -> CheckResult {
            tokio::time::sleep(self.delay).await;
            CheckResult::new("fixed", "http", "Fixed", self.severity, "fixed")
        }
    }

    struct Panicking;

    #[async_trait]
    impl Probe for Panicking {
        fn id(&self) -> &str {
            "panicking"
        }
        fn kind(&self) -> &str {
            "database"
        }
        fn name(&self) -> &str {
            "Panicking"
        }
        async fn check(&self) -> CheckResult {
            panic!("probe exploded");
        }
    }

    fn fixed(severity: Severity, delay_ms: u64) -> Fixed {
        Fixed {
            severity,
            delay: Duration::from_millis(delay_ms),
        }
    }

    fn orchestrator(registry: ProbeRegistry) -> (Orchestrator, Arc<StatusCache>, Arc<Broadcaster>) {
        let cache = Arc::new(StatusCache::new());
        let broadcaster = Arc::new(Broadcaster::new());
        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            Arc::clone(&cache),
            Arc::clone(&broadcaster),
        );
        (orchestrator, cache, broadcaster)
    }

    fn ok_and_error_registry() -> ProbeRegistry {
        let mut registry = ProbeRegistry::new();
        registry
            .register(
                SystemDefinition::new("up", "Up", "web", "prod").with_probe(fixed(Severity::Ok, 30)),
            )
            .unwrap();
        registry
            .register(
                SystemDefinition::new("down", "Down", "web", "prod")
                    .with_probe(fixed(Severity::Error, 5)),
            )
            .unwrap();
        registry
    }

    fn event_kind(frame: &[u8]) -> String {
        let text = std::str::from_utf8(frame).unwrap();
        text.lines()
            .next()
            .and_then(|l| l.strip_prefix("event: "))
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn run_all_aggregates_each_system() {
        let (orchestrator, cache, _) = orchestrator(ok_and_error_registry());

        let states = orchestrator.run_all().await;

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].id, "up");
        assert_eq!(states[0].status, SystemStatus::Ok);
        assert_eq!(states[1].id, "down");
        assert_eq!(states[1].status, SystemStatus::Error);
        assert_eq!(cache.count().await, 0);
    }

    #[tokio::test]
    async fn progressive_run_publishes_updates_then_completion() {
        let (orchestrator, cache, broadcaster) = orchestrator(ok_and_error_registry());
        let mut subscriber = broadcaster.subscribe().await;

        let updated = orchestrator.run_all_progressive().await;
        assert_eq!(updated, 2);

        let mut kinds = Vec::new();
        while let Some(frame) = subscriber.try_recv() {
            kinds.push(event_kind(&frame));
        }
        assert_eq!(
            kinds,
            vec![EVENT_SYSTEM_UPDATE, EVENT_SYSTEM_UPDATE, EVENT_CHECK_COMPLETE]
        );

        assert_eq!(cache.get("up").await.unwrap().status, SystemStatus::Ok);
        assert_eq!(cache.get("down").await.unwrap().status, SystemStatus::Error);
    }

    #[tokio::test]
    async fn run_one_unknown_id_is_none() {
        let (orchestrator, cache, broadcaster) = orchestrator(ok_and_error_registry());
        let mut subscriber = broadcaster.subscribe().await;

        assert!(orchestrator.run_one("missing").await.is_none());
        assert!(orchestrator.refresh_one("missing").await.is_none());

        assert_eq!(cache.count().await, 0);
        assert!(subscriber.try_recv().is_none());
    }

    #[tokio::test]
    async fn refresh_one_caches_and_publishes() {
        let (orchestrator, cache, broadcaster) = orchestrator(ok_and_error_registry());
        let mut subscriber = broadcaster.subscribe().await;

        let state = orchestrator.refresh_one("down").await.unwrap();

        assert_eq!(state.status, SystemStatus::Error);
        assert_eq!(cache.get("down").await, Some(state));
        assert!(cache.get("up").await.is_none());
        let frame = subscriber.try_recv().unwrap();
        assert_eq!(event_kind(&frame), EVENT_SYSTEM_UPDATE);
    }

    #[tokio::test]
    async fn panicking_probe_becomes_error_result() {
        let mut registry = ProbeRegistry::new();
        registry
            .register(
                SystemDefinition::new("mixed", "Mixed", "web", "prod")
                    .with_probe(fixed(Severity::Ok, 0))
                    .with_probe(Panicking),
            )
            .unwrap();
        let (orchestrator, _, _) = orchestrator(registry);

        let state = orchestrator.run_one("mixed").await.unwrap();

        assert_eq!(state.status, SystemStatus::Error);
        assert_eq!(state.checks.len(), 2);
        assert_eq!(state.checks[0].severity, Severity::Ok);
        assert_eq!(state.checks[1].id, "panicking");
        assert_eq!(state.checks[1].severity, Severity::Error);
    }

    struct Hanging;

    #[async_trait]
    impl Probe for Hanging {
        fn id(&self) -> &str {
            "hanging"
        }
        fn kind(&self) -> &str {
            "database"
        }
        fn name(&self) -> &str {
            "Hanging"
        }
        async fn check(&self) -> CheckResult {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_times_out_and_pass_completes() {
        let mut registry = ProbeRegistry::new();
        registry
            .register(
                SystemDefinition::new("stuck", "Stuck", "web", "prod")
                    .with_probe(fixed(Severity::Ok, 0))
                    .with_probe(Hanging),
            )
            .unwrap();
        let (orchestrator, cache, broadcaster) = orchestrator(registry);
        let mut subscriber = broadcaster.subscribe().await;

        let started = tokio::time::Instant::now();
        assert_eq!(orchestrator.run_all_progressive().await, 1);
        assert!(started.elapsed() >= PROBE_TIMEOUT);

        let state = cache.get("stuck").await.unwrap();
        assert_eq!(state.status, SystemStatus::Error);
        assert_eq!(state.checks[0].severity, Severity::Ok);
        assert_eq!(state.checks[1].id, "hanging");
        assert_eq!(state.checks[1].severity, Severity::Error);
        assert_eq!(state.checks[1].message, "Probe did not finish within 60s");

        let mut kinds = Vec::new();
        while let Some(frame) = subscriber.try_recv() {
            kinds.push(event_kind(&frame));
        }
        assert_eq!(kinds, vec![EVENT_SYSTEM_UPDATE, EVENT_CHECK_COMPLETE]);
    }

    #[tokio::test]
    async fn system_without_probes_is_unknown() {
        let mut registry = ProbeRegistry::new();
        registry
            .register(SystemDefinition::new("empty", "Empty", "web", "prod"))
            .unwrap();
        let (orchestrator, _, _) = orchestrator(registry);

        let states = orchestrator.run_all().await;
        assert_eq!(states[0].status, SystemStatus::Unknown);
    }

    #[tokio::test]
    async fn warm_cache_stores_without_publishing() {
        let (orchestrator, cache, broadcaster) = orchestrator(ok_and_error_registry());
        let mut subscriber = broadcaster.subscribe().await;

        assert_eq!(orchestrator.warm_cache().await, 2);
        assert_eq!(cache.count().await, 2);
        assert!(subscriber.try_recv().is_none());
    }
}
