//! Polling fallback
//!
//! When live mode is lost, the orchestrator ticks a poller every three
//! seconds. Each tick fetches tasks whose `updated` stamp passed the
//! per-board watermark and advances the watermark on success; failures are
//! ignored and the poller keeps ticking. Re-establishing a live stream
//! resets the watermark, because a fresh stream is authoritative and the
//! next fallback must not trust a stale cutoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::model::{collections, Task};
use crate::store::{Filter, RecordStore};

/// Interval between fallback polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

pub struct Poller {
    store: Arc<dyn RecordStore>,
    board_id: String,
    /// None means "never polled" (or freshly reset): fetch everything
    watermark: Option<DateTime<Utc>>,
}

impl Poller {
    pub fn new(store: Arc<dyn RecordStore>, board_id: &str) -> Self {
        Self {
            store,
            board_id: board_id.to_string(),
            watermark: None,
        }
    }

    /// Point the poller at another board; the old watermark does not apply
    pub fn set_board(&mut self, board_id: &str) {
        if self.board_id != board_id {
            self.board_id = board_id.to_string();
            self.watermark = None;
        }
    }

    /// Forget the watermark (a live stream took over as the authority)
    pub fn reset(&mut self) {
        self.watermark = None;
    }

    /// One poll tick. Returns the tasks changed since the watermark and
    /// advances it; a store failure returns `Ok(None)` so the caller keeps
    /// ticking.
    pub async fn tick(&mut self) -> Result<Option<Vec<Task>>> {
        let mut filter = Filter::new().eq("board", self.board_id.as_str());
        if let Some(watermark) = self.watermark {
            filter = filter.updated_after(watermark);
        }
        let now = Utc::now();
        match self.store.find_by_filter(collections::TASKS, &filter).await {
            Ok(records) => {
                self.watermark = Some(now);
                let tasks = records
                    .into_iter()
                    .filter_map(|r| serde_json::from_value(r).ok())
                    .collect();
                Ok(Some(tasks))
            }
            Err(e) => {
                tracing::debug!(error = %e, board = %self.board_id, "Poll tick failed");
                Ok(None)
            }
        }
    }
}
