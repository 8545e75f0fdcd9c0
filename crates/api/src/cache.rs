//! In-memory cache of the latest state per monitored system.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use statusboard_core::types::Timestamp;
use statusboard_core::SystemState;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// One cached system state plus when it was written.
#[derive(Debug, Clone)]
struct CacheEntry {
    state: SystemState,
    /// Wall-clock write time, reported to clients.
    updated_at: Timestamp,
    /// Monotonic write time, used for staleness.
    written_at: Instant,
}

/// Latest known [`SystemState`] keyed by system id.
///
/// Every write swaps a whole entry under the write lock, so readers never
/// see a partially updated state. Reads hand out clones. Entries are never
/// evicted; the key set is the fixed set of registered systems.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `state` under `id`, replacing any previous entry.
    pub async fn set(&self, id: &str, state: SystemState) {
        let entry = CacheEntry {
            state,
            updated_at: Utc::now(),
            written_at: Instant::now(),
        };
        self.entries.write().await.insert(id.to_string(), entry);
    }

    pub async fn get(&self, id: &str) -> Option<SystemState> {
        self.entries.read().await.get(id).map(|e| e.state.clone())
    }

    /// Snapshot of every cached state, in no particular order.
    pub async fn get_all(&self) -> Vec<SystemState> {
        self.entries
            .read()
            .await
            .values()
            .map(|e| e.state.clone())
            .collect()
    }

    /// True if `id` is absent or was written more than `max_age` ago.
    pub async fn is_stale(&self, id: &str, max_age: Duration) -> bool {
        match self.entries.read().await.get(id) {
            Some(entry) => entry.written_at.elapsed() > max_age,
            None => true,
        }
    }

    /// True if any of `ids` is stale.
    pub async fn any_stale<'a, I>(&self, ids: I, max_age: Duration) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = self.entries.read().await;
        ids.into_iter().any(|id| match entries.get(id) {
            Some(entry) => entry.written_at.elapsed() > max_age,
            None => true,
        })
    }

    /// When `id` was last written.
    pub async fn updated_at(&self, id: &str) -> Option<Timestamp> {
        self.entries.read().await.get(id).map(|e| e.updated_at)
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
