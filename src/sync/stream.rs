//! Realtime stream client
//!
//! Holds a long-lived SSE connection to the store host's `/api/realtime`
//! endpoint. The protocol: the server's first frame is a CONNECT event
//! carrying an opaque client id; the client installs its subscriptions with
//! a POST, then record-change frames arrive named by collection.
//!
//! Reconnection is a timer-driven state machine: exponential backoff capped
//! at 30 seconds, surrendering to the polling fallback after five
//! consecutive failures. Disconnect is idempotent via the cancellation
//! token, and the event queue outlives any single connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::sse::{SseDecoder, SseFrame};
use super::{ConnState, RecordAction, SyncEvent, SyncUpdate};
use crate::errors::{CoreError, Result};

/// Bounded queue capacity for record events
pub const EVENT_QUEUE_CAPACITY: usize = 100;

/// Consecutive connection failures before surrendering live mode
pub const MAX_CONNECT_ATTEMPTS: u32 = 5;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Collections the client subscribes to
const SUBSCRIPTIONS: [&str; 4] = ["tasks", "boards", "epics", "comments"];

/// Backoff before retry `n` (0-based): `min(1s * 2^n, 30s)`
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// True for the server's internal handshake frames, which never reach
/// consumers
fn is_connect_frame(frame: &SseFrame) -> bool {
    frame.event.ends_with("CONNECT")
}

/// Extract the opaque client id from a CONNECT frame
fn parse_client_id(frame: &SseFrame) -> Result<String> {
    let body: Value = serde_json::from_str(&frame.data)
        .map_err(|e| CoreError::transient(format!("bad CONNECT frame: {e}")))?;
    body.get("clientId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoreError::transient("CONNECT frame missing clientId"))
}

/// Decode a collection frame into a sync event. Internal frames, unnamed
/// frames, and unparseable bodies are filtered out.
fn parse_frame(frame: &SseFrame) -> Option<SyncEvent> {
    if frame.event.is_empty() || is_connect_frame(frame) {
        return None;
    }
    let body: Value = serde_json::from_str(&frame.data).ok()?;
    let action: RecordAction = serde_json::from_value(body.get("action")?.clone()).ok()?;
    let record = body.get("record")?.clone();
    Some(SyncEvent {
        collection: frame.event.clone(),
        action,
        record,
    })
}

/// Enqueue an event, dropping the newest on overflow. The polling fallback
/// resurfaces missed state eventually, so drops only bump the counter.
fn forward_event(tx: &mpsc::Sender<SyncUpdate>, dropped: &AtomicU64, event: SyncEvent) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(SyncUpdate::Event(event)) {
        let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(total, "Event queue full, dropped newest event");
    }
}

pub struct StreamClient {
    base_url: String,
    http: reqwest::Client,
    tx: mpsc::Sender<SyncUpdate>,
    dropped: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl StreamClient {
    pub fn new(
        base_url: &str,
        tx: mpsc::Sender<SyncUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            cancel,
        }
    }

    /// Events dropped on queue overflow since construction
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }

    /// Drive the connection state machine until cancellation or surrender.
    /// Sends `LiveLost` before returning if the reconnect budget ran out.
    pub async fn run(self) {
        let mut attempt: u32 = 0;
        let mut surrendered = false;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let state = if attempt == 0 {
                ConnState::Connecting
            } else {
                ConnState::Reconnecting
            };
            let _ = self.tx.send(SyncUpdate::State(state)).await;

            match self.run_connection(&mut attempt).await {
                Ok(()) => {
                    // Cancelled mid-stream
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Realtime stream failed");
                }
            }
            if self.cancel.is_cancelled() {
                break;
            }

            attempt += 1;
            if attempt >= MAX_CONNECT_ATTEMPTS {
                tracing::warn!("Reconnect budget exhausted, surrendering live mode");
                let _ = self.tx.send(SyncUpdate::State(ConnState::Polling)).await;
                let _ = self.tx.send(SyncUpdate::LiveLost).await;
                surrendered = true;
                break;
            }

            let delay = backoff_delay(attempt - 1);
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        // After a surrender the poller owns the status line; only a real
        // disconnect reports Disconnected
        if !surrendered {
            let _ = self
                .tx
                .send(SyncUpdate::State(ConnState::Disconnected))
                .await;
        }
    }

    /// One connection attempt: open the stream, complete the CONNECT
    /// handshake, then pump frames until the stream dies. A successful
    /// handshake resets the caller's failure counter.
    async fn run_connection(&self, attempt: &mut u32) -> Result<()> {
        let url = format!("{}/api/realtime", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CoreError::transient(format!(
                "realtime endpoint returned {}",
                resp.status()
            )));
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut subscribed = false;

        loop {
            let chunk = tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                chunk = stream.next() => chunk,
            };
            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Err(CoreError::transient(format!("stream read: {e}"))),
                None => return Err(CoreError::transient("stream closed by server")),
            };

            for frame in decoder.feed(&bytes) {
                if !subscribed {
                    // Nothing counts until the handshake frame arrives
                    if is_connect_frame(&frame) {
                        let client_id = parse_client_id(&frame)?;
                        self.subscribe(&client_id).await?;
                        subscribed = true;
                        *attempt = 0;
                        let _ = self.tx.send(SyncUpdate::State(ConnState::Connected)).await;
                        let _ = self.tx.send(SyncUpdate::LiveEstablished).await;
                        tracing::info!(%client_id, "Realtime stream established");
                    }
                    continue;
                }
                if let Some(event) = parse_frame(&frame) {
                    forward_event(&self.tx, &self.dropped, event);
                }
            }
        }
    }

    /// Install subscriptions for this client id
    async fn subscribe(&self, client_id: &str) -> Result<()> {
        let url = format!("{}/api/realtime", self.base_url);
        let body = serde_json::json!({
            "clientId": client_id,
            "subscriptions": SUBSCRIPTIONS,
        });
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(CoreError::transient(format!(
                "subscription install returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(16));
        assert_eq!(backoff_delay(5), Duration::from_secs(30));
        assert_eq!(backoff_delay(20), Duration::from_secs(30));
    }

    #[test]
    fn test_connect_frame_detection_and_id() {
        let frame = SseFrame {
            event: "PB_CONNECT".to_string(),
            data: json!({"clientId": "abc123"}).to_string(),
        };
        assert!(is_connect_frame(&frame));
        assert_eq!(parse_client_id(&frame).unwrap(), "abc123");

        let bare = SseFrame {
            event: "CONNECT".to_string(),
            data: json!({"clientId": "xyz"}).to_string(),
        };
        assert!(is_connect_frame(&bare));
    }

    #[test]
    fn test_connect_frame_without_id_is_an_error() {
        let frame = SseFrame {
            event: "CONNECT".to_string(),
            data: "{}".to_string(),
        };
        assert!(parse_client_id(&frame).is_err());
    }

    #[test]
    fn test_parse_collection_frame() {
        let frame = SseFrame {
            event: "tasks".to_string(),
            data: json!({"action": "update", "record": {"id": "t1"}}).to_string(),
        };
        let event = parse_frame(&frame).unwrap();
        assert_eq!(event.collection, "tasks");
        assert_eq!(event.action, RecordAction::Update);
        assert_eq!(event.record["id"], "t1");
    }

    #[test]
    fn test_internal_and_malformed_frames_filtered() {
        let connect = SseFrame {
            event: "PB_CONNECT".to_string(),
            data: json!({"clientId": "x"}).to_string(),
        };
        assert!(parse_frame(&connect).is_none());

        let unnamed = SseFrame {
            event: String::new(),
            data: "{}".to_string(),
        };
        assert!(parse_frame(&unnamed).is_none());

        let garbage = SseFrame {
            event: "tasks".to_string(),
            data: "not json".to_string(),
        };
        assert!(parse_frame(&garbage).is_none());

        let missing_action = SseFrame {
            event: "tasks".to_string(),
            data: json!({"record": {}}).to_string(),
        };
        assert!(parse_frame(&missing_action).is_none());
    }

    /// Overflow drops the newest event and counts it; the queue keeps the
    /// events that were already in flight
    #[tokio::test]
    async fn test_queue_overflow_drops_newest() {
        let (tx, mut rx) = mpsc::channel(2);
        let dropped = AtomicU64::new(0);
        for i in 0..5 {
            let event = SyncEvent {
                collection: "tasks".to_string(),
                action: RecordAction::Create,
                record: json!({"i": i}),
            };
            forward_event(&tx, &dropped, event);
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 3);

        // The two oldest survived
        for expected in 0..2 {
            match rx.recv().await.unwrap() {
                SyncUpdate::Event(event) => assert_eq!(event.record["i"], expected),
                other => panic!("unexpected update: {other:?}"),
            }
        }
    }
}
