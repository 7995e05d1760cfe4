//! Task graph: boards, tasks, comments, and their invariants
//!
//! All mutations flow through [`TaskGraph`], which owns the store handle,
//! the per-board sequence allocator, and the rebalance flags. Blocking
//! semantics live in `blocking.rs`, session binding in `sessions.rs`; both
//! extend this type.

mod blocking;
mod sessions;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::errors::{CoreError, Result};
use crate::model::{
    actions, collections, AuthorType, Board, Change, Comment, CreatedBy, Epic, HistoryEntry,
    Priority, Task, TaskType, COLUMN_NEED_INPUT,
};
use crate::position;
use crate::seq::SeqAllocator;
use crate::store::{Filter, RecordStore};

/// Where to place a task within its target column
#[derive(Debug, Clone, Default)]
pub enum Placement {
    /// Append at the end of the column
    #[default]
    End,
    /// Insert at display index `k`
    Index(usize),
    /// Insert directly after the given task
    After(String),
    /// Insert directly before the given task
    Before(String),
}

/// Inputs for task creation; everything beyond title and board is optional
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub board: String,
    pub title: String,
    pub description: String,
    pub task_type: Option<TaskType>,
    pub priority: Option<Priority>,
    pub column: Option<String>,
    pub labels: Vec<String>,
    pub epic: Option<String>,
    pub parent: Option<String>,
    pub due_date: Option<String>,
    pub created_by: CreatedBy,
    pub created_by_agent: Option<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<Priority>,
    pub column: Option<String>,
    pub labels: Option<Vec<String>>,
    pub epic: Option<Option<String>>,
    pub parent: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
}

pub struct TaskGraph {
    store: Arc<dyn RecordStore>,
    seq: SeqAllocator,
    /// Actor recorded in history entries written by this handle
    actor: String,
    /// Columns flagged for rebalancing: (board id, column key)
    rebalance_flags: Mutex<HashSet<(String, String)>>,
}

impl TaskGraph {
    pub fn new(store: Arc<dyn RecordStore>, actor: &str) -> Self {
        Self {
            store,
            seq: SeqAllocator::new(),
            actor: actor.to_string(),
            rebalance_flags: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub(crate) fn actor(&self) -> &str {
        &self.actor
    }

    // ── Boards ───────────────────────────────────────────────────────────

    /// Create a board, enforcing global prefix uniqueness
    pub async fn create_board(&self, name: &str, prefix: &str) -> Result<Board> {
        let board = Board::new(name, prefix)?;
        let existing = self
            .store
            .find_by_filter(
                collections::BOARDS,
                &Filter::new().eq("prefix", board.prefix.as_str()),
            )
            .await?;
        if !existing.is_empty() {
            return Err(CoreError::validation(format!(
                "board prefix {:?} is already in use",
                board.prefix
            )));
        }
        let saved = self
            .store
            .save(collections::BOARDS, serde_json::to_value(&board)?)
            .await?;
        Ok(serde_json::from_value(saved)?)
    }

    pub async fn get_board(&self, id: &str) -> Result<Board> {
        let record = self
            .store
            .find_by_id(collections::BOARDS, id)
            .await?
            .ok_or_else(|| CoreError::not_found("board", id))?;
        Ok(serde_json::from_value(record)?)
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let records = self
            .store
            .find_by_filter(collections::BOARDS, &Filter::new())
            .await?;
        let mut boards: Vec<Board> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r).ok())
            .collect();
        boards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(boards)
    }

    pub async fn find_board_by_prefix(&self, prefix: &str) -> Result<Board> {
        let prefix = prefix.to_ascii_uppercase();
        let records = self
            .store
            .find_by_filter(
                collections::BOARDS,
                &Filter::new().eq("prefix", prefix.as_str()),
            )
            .await?;
        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found("board", prefix.as_str()))?;
        Ok(serde_json::from_value(record)?)
    }

    /// Save admin edits to a board record
    pub async fn update_board(&self, board: &Board) -> Result<Board> {
        let saved = self
            .store
            .save(collections::BOARDS, serde_json::to_value(board)?)
            .await?;
        Ok(serde_json::from_value(saved)?)
    }

    /// Delete a board. With `delete_tasks` the board's tasks (and their
    /// comments) are removed; otherwise each task is orphaned by clearing
    /// its `board` field to the empty string.
    pub async fn delete_board(&self, id: &str, delete_tasks: bool) -> Result<()> {
        let board = self.get_board(id).await?;
        let tasks = self.board_tasks(&board.id).await?;
        for mut task in tasks {
            if delete_tasks {
                self.delete_task_records(&task.id).await?;
            } else {
                task.board = String::new();
                task.history.push(
                    HistoryEntry::new(actions::ORPHANED, &self.actor)
                        .with_change("board", Change::new(board.id.as_str(), "")),
                );
                self.save_task(&task).await?;
            }
        }
        self.store.delete(collections::BOARDS, &board.id).await
    }

    // ── Tasks ────────────────────────────────────────────────────────────

    /// Create a task with defaults and a `created` history entry
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        if new.title.trim().is_empty() {
            return Err(CoreError::validation("task title must not be empty"));
        }
        let board = self.get_board(&new.board).await?;
        let column = match new.column {
            Some(column) => {
                self.check_column(&board, &column)?;
                column
            }
            None => board.first_column().to_string(),
        };

        let seq = self.seq.allocate(self.store.as_ref(), &board.id).await?;
        let siblings = self.prepare_column(&board.id, &column).await?;
        let positions: Vec<f64> = siblings.iter().map(|t| t.position).collect();
        let pos = position::next(&positions);

        let actor = new.created_by.as_str().to_string();
        let task = Task {
            id: String::new(),
            board: board.id.clone(),
            seq,
            title: new.title.trim().to_string(),
            description: new.description,
            task_type: new.task_type.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            column,
            position: pos,
            labels: new.labels.into_iter().collect(),
            blocked_by: Default::default(),
            epic: new.epic,
            parent: new.parent,
            due_date: new.due_date,
            created_by: new.created_by,
            created_by_agent: new.created_by_agent,
            open_question: None,
            agent_session: None,
            history: vec![HistoryEntry::new(actions::CREATED, &actor)],
            created: chrono::Utc::now(),
            updated: chrono::Utc::now(),
        };
        self.save_task(&task).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        self.load_task(id).await
    }

    /// Resolve a task by record id or display id (`WRK-3`)
    pub async fn resolve_task(&self, reference: &str) -> Result<Task> {
        if let Ok((prefix, seq)) = crate::model::parse_display_id(reference) {
            if let Ok(board) = self.find_board_by_prefix(&prefix).await {
                let tasks = self.board_tasks(&board.id).await?;
                if let Some(task) = tasks.into_iter().find(|t| t.seq == seq) {
                    return Ok(task);
                }
                return Err(CoreError::not_found("task", reference));
            }
        }
        self.load_task(reference).await
    }

    /// All tasks on a board, sorted by column order then position
    pub async fn board_tasks(&self, board_id: &str) -> Result<Vec<Task>> {
        let records = self
            .store
            .find_by_filter(collections::TASKS, &Filter::new().eq("board", board_id))
            .await?;
        let mut tasks: Vec<Task> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r).ok())
            .collect();
        tasks.sort_by(|a, b| {
            a.column
                .cmp(&b.column)
                .then(a.position.total_cmp(&b.position))
        });
        Ok(tasks)
    }

    /// Tasks in one column, sorted by position
    pub async fn column_tasks(&self, board_id: &str, column: &str) -> Result<Vec<Task>> {
        let records = self
            .store
            .find_by_filter(
                collections::TASKS,
                &Filter::new().eq("board", board_id).eq("column", column),
            )
            .await?;
        let mut tasks: Vec<Task> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r).ok())
            .collect();
        tasks.sort_by(|a, b| a.position.total_cmp(&b.position));
        Ok(tasks)
    }

    /// Apply a partial patch, appending one history entry per changed field
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let mut task = self.load_task(id).await?;
        let mut entries: Vec<HistoryEntry> = Vec::new();

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(CoreError::validation("task title must not be empty"));
            }
            if title != task.title {
                entries.push(
                    HistoryEntry::new(actions::UPDATED, &self.actor)
                        .with_change("title", Change::new(task.title.as_str(), title.as_str())),
                );
                task.title = title;
            }
        }
        if let Some(description) = patch.description {
            if description != task.description {
                // Description diffs are stored whole, not line-itemised
                entries.push(
                    HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                        "description",
                        Change::new(task.description.as_str(), description.as_str()),
                    ),
                );
                task.description = description;
            }
        }
        if let Some(task_type) = patch.task_type {
            if task_type != task.task_type {
                entries.push(HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                    "type",
                    Change::new(task.task_type.as_str(), task_type.as_str()),
                ));
                task.task_type = task_type;
            }
        }
        if let Some(priority) = patch.priority {
            if priority != task.priority {
                entries.push(HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                    "priority",
                    Change::new(task.priority.as_str(), priority.as_str()),
                ));
                task.priority = priority;
            }
        }
        if let Some(labels) = patch.labels {
            let labels: std::collections::BTreeSet<String> = labels.into_iter().collect();
            if labels != task.labels {
                entries.push(HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                    "labels",
                    Change::new(
                        Value::from(task.labels.iter().cloned().collect::<Vec<_>>()),
                        Value::from(labels.iter().cloned().collect::<Vec<_>>()),
                    ),
                ));
                task.labels = labels;
            }
        }
        if let Some(epic) = patch.epic {
            if epic != task.epic {
                entries.push(HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                    "epic",
                    Change::new(
                        task.epic.clone().map_or(Value::Null, Value::from),
                        epic.clone().map_or(Value::Null, Value::from),
                    ),
                ));
                task.epic = epic;
            }
        }
        if let Some(parent) = patch.parent {
            if parent != task.parent {
                entries.push(HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                    "parent",
                    Change::new(
                        task.parent.clone().map_or(Value::Null, Value::from),
                        parent.clone().map_or(Value::Null, Value::from),
                    ),
                ));
                task.parent = parent;
            }
        }
        if let Some(due_date) = patch.due_date {
            if due_date != task.due_date {
                entries.push(HistoryEntry::new(actions::UPDATED, &self.actor).with_change(
                    "due_date",
                    Change::new(
                        task.due_date.clone().map_or(Value::Null, Value::from),
                        due_date.clone().map_or(Value::Null, Value::from),
                    ),
                ));
                task.due_date = due_date;
            }
        }

        task.history.extend(entries);
        let task = self.save_task(&task).await?;

        // Column changes route through move so position allocation and the
        // dependency cascade stay in one place
        if let Some(column) = patch.column {
            if column != task.column {
                return self.move_task(&task.id, &column, Placement::End).await;
            }
        }
        Ok(task)
    }

    /// Move a task to a column at the given placement. A move to the current
    /// column is a reorder-only update; observers are still notified because
    /// the task's `updated` stamp advances.
    pub async fn move_task(&self, id: &str, column: &str, place: Placement) -> Result<Task> {
        let mut task = self.load_task(id).await?;
        let board = self.get_board(&task.board).await?;
        self.check_column(&board, column)?;

        // I4: the pause column requires an open reason; plain moves into it
        // are rejected unless something is actually blocking the task
        if column == COLUMN_NEED_INPUT
            && task.column != COLUMN_NEED_INPUT
            && task.open_question.is_none()
            && self.open_blockers(&task).await?.is_empty()
        {
            return Err(CoreError::validation(
                "cannot move into need_input without an open question; use block",
            ));
        }

        let siblings = self.prepare_column(&board.id, column).await?;
        let positions: Vec<f64> = siblings
            .iter()
            .filter(|t| t.id != task.id)
            .map(|t| t.position)
            .collect();

        let new_position = match place {
            Placement::End => position::next(&positions),
            Placement::Index(k) => position::at_index(&positions, k),
            Placement::After(anchor_id) => {
                let anchor = siblings
                    .iter()
                    .find(|t| t.id == anchor_id)
                    .ok_or_else(|| CoreError::not_found("task", anchor_id.as_str()))?;
                position::after(&positions, anchor.position)
            }
            Placement::Before(anchor_id) => {
                let anchor = siblings
                    .iter()
                    .find(|t| t.id == anchor_id)
                    .ok_or_else(|| CoreError::not_found("task", anchor_id.as_str()))?;
                position::before(&positions, anchor.position)
            }
        };

        let old_column = task.column.clone();
        if old_column != column {
            task.history.push(
                HistoryEntry::new(actions::MOVED, &self.actor)
                    .with_change("column", Change::new(old_column.as_str(), column)),
            );
        } else {
            task.history.push(
                HistoryEntry::new(actions::MOVED, &self.actor)
                    .with_change("position", Change::new(task.position, new_position)),
            );
        }
        task.column = column.to_string();
        task.position = new_position;
        // Leaving the pause column by hand clears the pending question
        if old_column == COLUMN_NEED_INPUT && column != COLUMN_NEED_INPUT {
            task.open_question = None;
        }

        self.flag_if_cramped(&board.id, column, &positions, new_position);
        let task = self.save_task(&task).await?;

        // Dependency cascade on completion state changes
        if column == crate::model::COLUMN_DONE && old_column != crate::model::COLUMN_DONE {
            self.on_blocker_completed(&task).await?;
        } else if old_column == crate::model::COLUMN_DONE && column != crate::model::COLUMN_DONE {
            self.on_blocker_reopened(&task).await?;
        }
        Ok(task)
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        // Surface NotFound before touching comments
        let task = self.load_task(id).await?;
        self.delete_task_records(&task.id).await
    }

    async fn delete_task_records(&self, id: &str) -> Result<()> {
        let comments = self
            .store
            .find_by_filter(collections::COMMENTS, &Filter::new().eq("task", id))
            .await?;
        for comment in comments {
            if let Some(comment_id) = comment.get("id").and_then(Value::as_str) {
                self.store.delete(collections::COMMENTS, comment_id).await?;
            }
        }
        self.store.delete(collections::TASKS, id).await
    }

    // ── Comments ─────────────────────────────────────────────────────────

    pub async fn add_comment(
        &self,
        task_id: &str,
        content: &str,
        author_type: AuthorType,
    ) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(CoreError::validation("comment content must not be empty"));
        }
        // Comments belong to a task; reject dangling writes
        self.load_task(task_id).await?;
        let comment = Comment::new(task_id, content, author_type);
        let saved = self
            .store
            .save(collections::COMMENTS, serde_json::to_value(&comment)?)
            .await?;
        Ok(serde_json::from_value(saved)?)
    }

    pub async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>> {
        let records = self
            .store
            .find_by_filter(collections::COMMENTS, &Filter::new().eq("task", task_id))
            .await?;
        let mut comments: Vec<Comment> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r).ok())
            .collect();
        comments.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(comments)
    }

    // ── Epics ────────────────────────────────────────────────────────────

    pub async fn list_epics(&self, board_id: &str) -> Result<Vec<Epic>> {
        let records = self
            .store
            .find_by_filter(collections::EPICS, &Filter::new().eq("board", board_id))
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r).ok())
            .collect())
    }

    // ── Internals ────────────────────────────────────────────────────────

    pub(crate) async fn load_task(&self, id: &str) -> Result<Task> {
        let record = self
            .store
            .find_by_id(collections::TASKS, id)
            .await?
            .ok_or_else(|| CoreError::not_found("task", id))?;
        Ok(serde_json::from_value(record)?)
    }

    /// Save a task, re-reading and retrying a bounded number of times when
    /// the store reports a commit-time conflict (lost position race,
    /// duplicate seq). Our write wins the retry; racing position duplicates
    /// resolve on the next rebalance.
    pub(crate) async fn save_task(&self, task: &Task) -> Result<Task> {
        const RETRIES: u32 = 3;
        const BACKOFF_MS: u64 = 50;

        let mut record = serde_json::to_value(task)?;
        let mut attempt = 0;
        loop {
            match self.store.save(collections::TASKS, record.clone()).await {
                Ok(saved) => return Ok(serde_json::from_value(saved)?),
                Err(CoreError::Conflict { .. }) if attempt < RETRIES => {
                    attempt += 1;
                    tracing::debug!(task = %task.id, attempt, "Task save conflict, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(BACKOFF_MS)).await;
                    // Re-read so the retry carries the store's bookkeeping
                    // fields forward instead of a stale snapshot's
                    if let Some(current) = self
                        .store
                        .find_by_id(collections::TASKS, &task.id)
                        .await?
                    {
                        if let Some(updated) = current.get("updated") {
                            record["updated"] = updated.clone();
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_column(&self, board: &Board, column: &str) -> Result<()> {
        if board.has_column(column) {
            Ok(())
        } else {
            Err(CoreError::validation(format!(
                "column {:?} is not on board {:?} (columns: {})",
                column,
                board.name,
                board.columns.join(", ")
            )))
        }
    }

    /// Load a column's tasks, applying a pending rebalance first.
    /// Rebalancing preserves relative order and assigns `GAP, 2·GAP, …`.
    async fn prepare_column(&self, board_id: &str, column: &str) -> Result<Vec<Task>> {
        let mut tasks = self.column_tasks(board_id, column).await?;
        let flagged = {
            let flags = self.rebalance_flags.lock().unwrap();
            flags.contains(&(board_id.to_string(), column.to_string()))
        };
        let positions: Vec<f64> = tasks.iter().map(|t| t.position).collect();
        if flagged || position::needs_rebalance(&positions) {
            tracing::info!(board = board_id, column, count = tasks.len(), "Rebalancing column");
            let fresh = position::rebalance(tasks.len());
            for (task, pos) in tasks.iter_mut().zip(fresh) {
                task.position = pos;
                *task = self.save_task(task).await?;
            }
            let mut flags = self.rebalance_flags.lock().unwrap();
            flags.remove(&(board_id.to_string(), column.to_string()));
        }
        Ok(tasks)
    }

    /// Flag the column when the new position landed inside a sub-MIN_GAP gap
    fn flag_if_cramped(&self, board_id: &str, column: &str, positions: &[f64], new_pos: f64) {
        let mut all: Vec<f64> = positions.to_vec();
        all.push(new_pos);
        all.sort_by(f64::total_cmp);
        if position::needs_rebalance(&all) {
            let mut flags = self.rebalance_flags.lock().unwrap();
            flags.insert((board_id.to_string(), column.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;

    async fn graph() -> TaskGraph {
        TaskGraph::new(Arc::new(LocalStore::in_memory()), "user")
    }

    /// Scenario 1: create board + first task, check all defaults
    #[tokio::test]
    async fn test_create_and_assign() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();

        let task = graph
            .create_task(NewTask {
                board: board.id.clone(),
                title: "Fix login".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(task.seq, 1);
        assert_eq!(task.display_id(&board.prefix), "WRK-1");
        assert_eq!(task.column, "backlog");
        assert_eq!(task.position, 1000.0);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.task_type, TaskType::Feature);
        assert_eq!(task.history.len(), 1);
        assert_eq!(task.history[0].action, actions::CREATED);

        let board = graph.get_board(&board.id).await.unwrap();
        assert_eq!(board.next_seq, 2);
    }

    #[tokio::test]
    async fn test_duplicate_prefix_rejected() {
        let graph = graph().await;
        graph.create_board("Work", "WRK").await.unwrap();
        assert!(matches!(
            graph.create_board("Other", "wrk").await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let result = graph
            .create_task(NewTask {
                board: board.id,
                title: "  ".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_board_is_not_found() {
        let graph = graph().await;
        let result = graph
            .create_task(NewTask {
                board: "ghost".to_string(),
                title: "t".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_appends_one_history_entry_per_field() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id,
                title: "old title".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let task = graph
            .update_task(
                &task.id,
                TaskPatch {
                    title: Some("new title".to_string()),
                    priority: Some(Priority::Urgent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(task.title, "new title");
        assert_eq!(task.priority, Priority::Urgent);
        let updates: Vec<_> = task
            .history
            .iter()
            .filter(|h| h.action == actions::UPDATED)
            .collect();
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().any(|h| h.changes.contains_key("title")));
        assert!(updates.iter().any(|h| h.changes.contains_key("priority")));
    }

    #[tokio::test]
    async fn test_unchanged_fields_write_no_history() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id,
                title: "same".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let task = graph
            .update_task(
                &task.id,
                TaskPatch {
                    title: Some("same".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.history.len(), 1); // just the created entry
    }

    #[tokio::test]
    async fn test_move_to_unknown_column_rejected() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id,
                title: "t".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(matches!(
            graph.move_task(&task.id, "shipping", Placement::End).await,
            Err(CoreError::Validation(_))
        ));
    }

    /// Same-column move is a reorder-only update and still bumps `updated`
    #[tokio::test]
    async fn test_same_column_move_reorders() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let first = graph
            .create_task(NewTask {
                board: board.id.clone(),
                title: "first".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = graph
            .create_task(NewTask {
                board: board.id.clone(),
                title: "second".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let moved = graph
            .move_task(&second.id, "backlog", Placement::Index(0))
            .await
            .unwrap();
        assert!(moved.position < first.position);

        let column = graph.column_tasks(&board.id, "backlog").await.unwrap();
        assert_eq!(column[0].id, second.id);
        assert!(moved.updated >= second.updated);
    }

    /// Dense anchored inserts halve the gap; once it passes MIN_GAP the
    /// next write into the column rebalances without reordering
    #[tokio::test]
    async fn test_dense_inserts_keep_order_through_rebalance() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();

        let first = graph
            .create_task(NewTask {
                board: board.id.clone(),
                title: "task-0".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        // Each insert lands directly after task-0, halving the gap to its
        // successor. Rebalances fire whenever the flag trips mid-loop; the
        // ordering invariant must hold throughout.
        let mut order = vec![first.id.clone()];
        for i in 1..30 {
            let task = graph
                .create_task(NewTask {
                    board: board.id.clone(),
                    title: format!("task-{i}"),
                    ..Default::default()
                })
                .await
                .unwrap();
            let task = graph
                .move_task(&task.id, "backlog", Placement::After(first.id.clone()))
                .await
                .unwrap();
            order.insert(1, task.id);

            let column = graph.column_tasks(&board.id, "backlog").await.unwrap();
            let actual: Vec<&String> = column.iter().map(|t| &t.id).collect();
            let expected: Vec<&String> = order.iter().collect();
            assert_eq!(actual, expected, "order broke after insert {i}");
            assert!(column.iter().all(|t| t.position > 0.0));
        }
    }

    /// Scenario 5: a cramped 50-task column is rewritten to GAP..50*GAP by
    /// the next move, display order unchanged
    #[tokio::test]
    async fn test_rebalance_rewrites_cramped_column() {
        let store = Arc::new(LocalStore::in_memory());
        let graph = TaskGraph::new(store.clone(), "user");
        let board = graph.create_board("Work", "WRK").await.unwrap();

        let mut order = Vec::new();
        for i in 0..50 {
            let task = graph
                .create_task(NewTask {
                    board: board.id.clone(),
                    title: format!("task-{i}"),
                    ..Default::default()
                })
                .await
                .unwrap();
            order.push(task.id);
        }

        // Cram every gap below MIN_GAP behind the service's back, as a
        // pile-up of racing writers would
        for (i, id) in order.iter().enumerate() {
            let mut record = store
                .find_by_id(collections::TASKS, id)
                .await
                .unwrap()
                .unwrap();
            record["position"] = serde_json::json!(1.0 + i as f64 * 0.0001);
            store.save(collections::TASKS, record).await.unwrap();
        }

        // The next move observes the cramped gaps and rebalances first
        let last = order.last().unwrap().clone();
        graph
            .move_task(&last, "backlog", Placement::End)
            .await
            .unwrap();

        let column = graph.column_tasks(&board.id, "backlog").await.unwrap();
        assert_eq!(column.len(), 50);
        let actual: Vec<&String> = column.iter().map(|t| &t.id).collect();
        let expected: Vec<&String> = order.iter().collect();
        assert_eq!(actual, expected, "relative order must survive rebalance");
        for (i, task) in column.iter().enumerate() {
            assert_eq!(task.position, (i + 1) as f64 * position::DEFAULT_GAP);
        }
    }

    #[tokio::test]
    async fn test_delete_board_orphans_tasks() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id.clone(),
                title: "t".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        graph.delete_board(&board.id, false).await.unwrap();
        let task = graph.get_task(&task.id).await.unwrap();
        assert_eq!(task.board, "");
        assert!(task.history.iter().any(|h| h.action == actions::ORPHANED));
    }

    #[tokio::test]
    async fn test_delete_board_cascades_tasks_and_comments() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id.clone(),
                title: "t".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        graph
            .add_comment(&task.id, "note", AuthorType::Human)
            .await
            .unwrap();

        graph.delete_board(&board.id, true).await.unwrap();
        assert!(matches!(
            graph.get_task(&task.id).await,
            Err(CoreError::NotFound { .. })
        ));
        let comments = graph.list_comments(&task.id).await;
        assert!(comments.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_by_display_id() {
        let graph = graph().await;
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id,
                title: "t".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let by_display = graph.resolve_task("WRK-1").await.unwrap();
        assert_eq!(by_display.id, task.id);
        let lowercase = graph.resolve_task("wrk-1").await.unwrap();
        assert_eq!(lowercase.id, task.id);
        let by_id = graph.resolve_task(&task.id).await.unwrap();
        assert_eq!(by_id.id, task.id);
        assert!(graph.resolve_task("WRK-99").await.is_err());
    }
}
