//! Activity-aware periodic refresh.
//!
//! Re-runs the progressive check pass every `interval`, but skips the pass
//! when no request has touched the service within `idle_timeout`. Inbound
//! requests call [`Scheduler::mark_activity`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::Orchestrator;

/// How long [`Scheduler::stop`] waits for an in-flight pass to wind down
/// before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// What a single timer tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A progressive pass ran and updated this many systems.
    Ran { systems: usize },
    /// Nobody has been active for `idle_for`; the pass was skipped.
    Skipped { idle_for: Duration },
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Timer-driven re-check loop that pauses while nobody is watching.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    idle_timeout: Duration,
    last_activity: RwLock<Instant>,
    worker: Mutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration, idle_timeout: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            idle_timeout,
            last_activity: RwLock::new(Instant::now()),
            worker: Mutex::new(None),
        }
    }

    /// Start the timer loop. A no-op if it is already running.
    ///
    /// The first tick fires one `interval` after starting. Ticks missed
    /// while a pass runs are dropped, not replayed.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            tracing::debug!("Scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + scheduler.interval, scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::info!("Scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        scheduler.tick().await;
                    }
                }
            }
        });

        *worker = Some(Worker { cancel, handle });
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Scheduler started"
        );
    }

    /// Stop the timer loop. A no-op if it is not running, including when
    /// several callers race to stop it.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        worker.cancel.cancel();
        let mut handle = worker.handle;
        if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
            tracing::warn!(
                timeout_secs = STOP_TIMEOUT.as_secs(),
                "Scheduler did not stop in time, aborting the running pass"
            );
            handle.abort();
        }
        tracing::info!("Scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Record external activity now.
    pub async fn mark_activity(&self) {
        *self.last_activity.write().await = Instant::now();
    }

    pub async fn time_since_last_activity(&self) -> Duration {
        self.last_activity.read().await.elapsed()
    }

    /// True if the last activity is older than the idle timeout.
    pub async fn is_idle(&self) -> bool {
        self.time_since_last_activity().await > self.idle_timeout
    }

    /// One timer tick: run a progressive pass unless idle.
    pub async fn tick(&self) -> TickOutcome {
        let idle_for = self.time_since_last_activity().await;
        if idle_for > self.idle_timeout {
            tracing::info!(
                idle_secs = idle_for.as_secs(),
                idle_timeout_secs = self.idle_timeout.as_secs(),
                "No recent activity, skipping scheduled checks"
            );
            return TickOutcome::Skipped { idle_for };
        }

        tracing::info!(idle_secs = idle_for.as_secs(), "Running scheduled checks");
        let systems = self.orchestrator.run_all_progressive().await;
        TickOutcome::Ran { systems }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
