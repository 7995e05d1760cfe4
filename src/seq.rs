//! Per-board sequence allocation
//!
//! `allocate` is linearisable per board: a per-board async mutex is held
//! across the read-modify-write, so two concurrent allocations on the same
//! board always return distinct values and `next_seq` advances exactly once
//! per success. A failed store write consumes no value.
//!
//! Legacy boards carry `next_seq == 0`; the first allocation initializes the
//! counter from the maximum observed task seq inside the same critical
//! section. There is no scan-based allocation path beyond that.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::{CoreError, Result};
use crate::model::{collections, Board};
use crate::store::{Filter, RecordStore};

/// Retries for commit-time conflicts before surfacing
const CONFLICT_RETRIES: u32 = 3;
const CONFLICT_BACKOFF_MS: u64 = 50;

#[derive(Default)]
pub struct SeqAllocator {
    /// One lock per board id, created lazily
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SeqAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    async fn board_lock(&self, board_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(board_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the board's current `next_seq` and advance it by one
    pub async fn allocate(&self, store: &dyn RecordStore, board_id: &str) -> Result<u64> {
        let lock = self.board_lock(board_id).await;
        let _guard = lock.lock().await;

        let mut attempt = 0;
        loop {
            match self.try_allocate(store, board_id).await {
                Err(CoreError::Conflict { .. }) if attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(board = board_id, attempt, "Seq allocation conflict, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(CONFLICT_BACKOFF_MS))
                        .await;
                }
                other => return other,
            }
        }
    }

    async fn try_allocate(&self, store: &dyn RecordStore, board_id: &str) -> Result<u64> {
        let record = store
            .find_by_id(collections::BOARDS, board_id)
            .await?
            .ok_or_else(|| CoreError::not_found("board", board_id))?;
        let mut board: Board = serde_json::from_value(record)?;

        if board.next_seq == 0 {
            board.next_seq = self.max_observed_seq(store, board_id).await? + 1;
            tracing::info!(
                board = board_id,
                next_seq = board.next_seq,
                "Initialized legacy sequence counter"
            );
        }

        let seq = board.next_seq;
        board.next_seq = seq + 1;
        store
            .save(collections::BOARDS, serde_json::to_value(&board)?)
            .await?;
        Ok(seq)
    }

    async fn max_observed_seq(&self, store: &dyn RecordStore, board_id: &str) -> Result<u64> {
        let tasks = store
            .find_by_filter(collections::TASKS, &Filter::new().eq("board", board_id))
            .await?;
        Ok(tasks
            .iter()
            .filter_map(|t| t.get("seq").and_then(Value::as_u64))
            .max()
            .unwrap_or(0))
    }
}
