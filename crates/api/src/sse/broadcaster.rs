use std::collections::HashMap;

use axum::body::Bytes;
use serde::Serialize;
use serde_json::json;
use statusboard_core::SystemState;
use tokio::sync::{mpsc, RwLock};

/// Event sent once to a new subscriber with its client id.
pub const EVENT_CONNECTED: &str = "connected";
/// Event carrying one [`SystemState`].
pub const EVENT_SYSTEM_UPDATE: &str = "system_update";
/// Event marking the end of a full check pass.
pub const EVENT_CHECK_COMPLETE: &str = "check_complete";

/// Pending messages per subscriber when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Comment frame used as a keep-alive; ignored by `EventSource`.
const KEEP_ALIVE: &[u8] = b": keep-alive\n\n";

/// Format one server-sent event frame.
pub fn format_event(kind: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {kind}\ndata: {data}\n\n"))
}

/// A registered live viewer.
///
/// Owned by the delivery side. Pass [`Subscriber::id`] to
/// [`Broadcaster::unsubscribe`] when the viewer goes away.
pub struct Subscriber {
    pub id: String,
    receiver: mpsc::Receiver<Bytes>,
}

impl Subscriber {
    /// Next queued frame, or `None` once the broadcaster dropped this
    /// subscriber.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Next queued frame if one is ready.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.receiver.try_recv().ok()
    }
}

/// Fans published events out to every connected viewer.
///
/// Each subscriber has a bounded queue. A publish that finds a queue full
/// drops the message for that subscriber only; publishing never waits on
/// a slow viewer.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<String, mpsc::Sender<Bytes>>>,
    capacity: usize,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber with a fresh `client_<uuid>` id.
    pub async fn subscribe(&self) -> Subscriber {
        let id = format!("client_{}", uuid::Uuid::new_v4());
        let (tx, receiver) = mpsc::channel(self.capacity);

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id.clone(), tx);
        tracing::info!(client_id = %id, total = subscribers.len(), "SSE client subscribed");

        Subscriber { id, receiver }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: &str) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(id).is_some() {
            tracing::info!(client_id = %id, total = subscribers.len(), "SSE client unsubscribed");
        }
    }

    /// Serialize `payload` once and enqueue the frame for every subscriber.
    ///
    /// Returns how many subscribers accepted the message.
    pub async fn publish<T: Serialize + ?Sized>(&self, kind: &str, payload: &T) -> usize {
        let data = match serde_json::to_string(payload) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(event = kind, error = %e, "Failed to serialize SSE payload");
                return 0;
            }
        };
        self.send_frame(kind, format_event(kind, &data)).await
    }

    async fn send_frame(&self, kind: &str, frame: Bytes) -> usize {
        let subscribers = self.subscribers.read().await;
        if subscribers.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(client_id = %id, event = kind, "SSE queue full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(client_id = %id, event = kind, "SSE receiver gone");
                }
            }
        }

        tracing::debug!(event = kind, delivered, total = subscribers.len(), "SSE broadcast");
        delivered
    }

    /// Publish a `system_update` event.
    pub async fn publish_system(&self, state: &SystemState) -> usize {
        self.publish(EVENT_SYSTEM_UPDATE, state).await
    }

    /// Publish the `check_complete` marker.
    pub async fn publish_check_complete(&self) -> usize {
        self.publish(
            EVENT_CHECK_COMPLETE,
            &json!({ "message": "All checks completed" }),
        )
        .await
    }

    /// Enqueue a keep-alive comment for every subscriber.
    pub async fn ping_all(&self) -> usize {
        self.send_frame("keep-alive", Bytes::from_static(KEEP_ALIVE))
            .await
    }

    pub async fn client_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drop every subscriber. Their streams end once drained.
    pub async fn shutdown_all(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len();
        subscribers.clear();
        tracing::info!(count, "Closed all SSE subscribers");
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
