use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::sse::broadcaster::{format_event, EVENT_CONNECTED};
use crate::state::AppState;

/// GET /api/events -- stream live updates as server-sent events.
///
/// Registers a subscriber, sends a `connected` event carrying its client
/// id, then forwards every frame the broadcaster queues for it. A delivery
/// task owns the subscriber; when the client disconnects the response body
/// is dropped, the task notices the closed channel and unsubscribes.
pub async fn events_handler(State(state): State<AppState>) -> Response {
    state.scheduler.mark_activity().await;

    let broadcaster = state.broadcaster;
    let mut subscriber = broadcaster.subscribe().await;
    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, Infallible>>(1);

    tokio::spawn(async move {
        let client_id = subscriber.id.clone();
        let hello = format_event(EVENT_CONNECTED, &json!({ "client_id": client_id }).to_string());

        if body_tx.send(Ok(hello)).await.is_ok() {
            loop {
                tokio::select! {
                    _ = body_tx.closed() => break,
                    frame = subscriber.recv() => match frame {
                        Some(frame) => {
                            if body_tx.send(Ok(frame)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        }

        broadcaster.unsubscribe(&client_id).await;
        tracing::debug!(client_id = %client_id, "SSE stream closed");
    });

    let mut response = Body::from_stream(ReceiverStream::new(body_rx)).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
