//! Live-sync plane
//!
//! Interactive clients never poll the store continuously. A stream client
//! consumes the store host's server-sent event feed and fans record changes
//! into a bounded queue; when the stream cannot be held open, a 3-second
//! poller with a per-board watermark takes over until the host is healthy
//! again.

pub mod poll;
pub mod sse;
pub mod stream;

use serde::Deserialize;
use serde_json::Value;

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
}

/// One change fanned out by the store host, named by collection
#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub collection: String,
    pub action: RecordAction,
    pub record: Value,
}

/// Connection state surfaced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Transient marker while backoff retries run
    Reconnecting,
    /// Live mode surrendered; the poller is covering
    Polling,
}

impl ConnState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "offline",
            Self::Connecting => "connecting",
            Self::Connected => "live",
            Self::Reconnecting => "reconnecting",
            Self::Polling => "polling",
        }
    }
}

/// Messages the sync plane delivers to the orchestrator's mailbox
#[derive(Debug, Clone)]
pub enum SyncUpdate {
    /// Connection state changed (drives the status area)
    State(ConnState),
    /// A record changed on the host
    Event(SyncEvent),
    /// The stream client gave up after its reconnect budget;
    /// the orchestrator should start the polling fallback
    LiveLost,
    /// A live stream is established and authoritative;
    /// per-board watermarks should be reset
    LiveEstablished,
}
