use std::sync::Arc;
use std::time::Duration;

use crate::sse::broadcaster::Broadcaster;

/// Spawn a background task that sends a keep-alive comment to every SSE
/// subscriber each `interval`.
///
/// Runs until the returned handle is aborted.
pub fn start_heartbeat(
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let count = broadcaster.ping_all().await;
            tracing::trace!(count, "SSE heartbeat");
        }
    })
}
