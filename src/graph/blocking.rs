//! Block / unblock semantics and dependency consistency
//!
//! Two things pause a task into `need_input`: an explicit `block` carrying a
//! question for the human, and an unfinished dependency. The two are kept
//! distinguishable — `open_question` is set only by explicit blocks — so the
//! completion cascade releases exactly the tasks it paused and never eats a
//! pending question.

use std::collections::HashSet;

use crate::errors::{CoreError, Result};
use crate::model::{
    actions, collections, AuthorType, Change, HistoryEntry, Task, COLUMN_DONE, COLUMN_NEED_INPUT,
    COLUMN_TODO,
};
use crate::store::Filter;

use super::TaskGraph;

impl TaskGraph {
    /// Pause a task on an open question. Sets `column = need_input`, records
    /// the reason in history, and writes an agent-authored comment carrying
    /// the question. Idempotent while the same reason is pending.
    pub async fn block(&self, id: &str, reason: &str) -> Result<Task> {
        if reason.trim().is_empty() {
            return Err(CoreError::validation("block reason must not be empty"));
        }
        let task = self.load_task(id).await?;
        if task.is_paused() && task.open_question.as_deref() == Some(reason) {
            return Ok(task);
        }

        let board = self.get_board(&task.board).await?;
        let siblings = self.column_tasks(&board.id, COLUMN_NEED_INPUT).await?;
        let positions: Vec<f64> = siblings
            .iter()
            .filter(|t| t.id != task.id)
            .map(|t| t.position)
            .collect();

        let mut task = task;
        let old_column = task.column.clone();
        task.history.push(
            HistoryEntry::new(actions::BLOCKED, "agent")
                .with_change("column", Change::new(old_column.as_str(), COLUMN_NEED_INPUT))
                .with_change("reason", Change::new(serde_json::Value::Null, reason)),
        );
        task.column = COLUMN_NEED_INPUT.to_string();
        task.position = crate::position::next(&positions);
        task.open_question = Some(reason.to_string());
        let task = self.save_task(&task).await?;

        // The comment and the session index are best-effort: the pause
        // itself has already committed
        if let Err(e) = self
            .add_comment(&task.id, reason, AuthorType::Agent)
            .await
        {
            tracing::warn!(task = %task.id, error = %e, "Failed to write blocking comment");
        }
        if let Err(e) = self.mark_session_paused(&task).await {
            tracing::warn!(task = %task.id, error = %e, "Failed to update session index");
        }
        Ok(task)
    }

    /// Resume a paused task into the column it was blocked from.
    /// Requires `column == need_input`.
    pub async fn unblock(&self, id: &str) -> Result<Task> {
        let task = self.load_task(id).await?;
        if !task.is_paused() {
            return Err(CoreError::validation(format!(
                "task is in {:?}, not {COLUMN_NEED_INPUT}",
                task.column
            )));
        }
        let target = task
            .column_before_block()
            .unwrap_or(COLUMN_TODO)
            .to_string();
        let siblings = self.column_tasks(&task.board, &target).await?;
        let positions: Vec<f64> = siblings
            .iter()
            .filter(|t| t.id != task.id)
            .map(|t| t.position)
            .collect();

        let mut task = task;
        task.open_question = None;
        task.history.push(
            HistoryEntry::new(actions::UNBLOCKED, self.actor())
                .with_change("column", Change::new(COLUMN_NEED_INPUT, target.as_str())),
        );
        task.column = target;
        task.position = crate::position::next(&positions);
        let task = self.save_task(&task).await?;

        if let Err(e) = self.mark_session_active(&task).await {
            tracing::warn!(task = %task.id, error = %e, "Failed to update session index");
        }
        Ok(task)
    }

    /// Add a dependency edge `task → blocker`. Rejects self-blocks and any
    /// edge that would close a cycle. An unfinished blocker pauses the task.
    pub async fn add_blocked_by(&self, task_id: &str, blocker_id: &str) -> Result<Task> {
        let mut task = self.load_task(task_id).await?;
        let blocker = self.load_task(blocker_id).await?;

        if task.id == blocker.id {
            return Err(CoreError::validation("a task cannot block itself"));
        }
        if self.reaches(&blocker.id, &task.id).await? {
            return Err(CoreError::validation(format!(
                "dependency cycle: {} already depends on {}",
                blocker.id, task.id
            )));
        }
        if task.blocked_by.contains(&blocker.id) {
            return Ok(task);
        }

        task.blocked_by.insert(blocker.id.clone());
        task.history.push(
            HistoryEntry::new(actions::UPDATED, self.actor()).with_change(
                "blocked_by",
                Change::new(serde_json::Value::Null, blocker.id.as_str()),
            ),
        );
        let task = self.save_task(&task).await?;

        if blocker.column != COLUMN_DONE && !task.is_paused() {
            return self.pause_for_dependency(task).await;
        }
        Ok(task)
    }

    /// Remove a dependency edge. If it was the last open dependency of a
    /// dependency-paused task, the task leaves `need_input`.
    pub async fn remove_blocked_by(&self, task_id: &str, blocker_id: &str) -> Result<Task> {
        let mut task = self.load_task(task_id).await?;
        if !task.blocked_by.remove(blocker_id) {
            return Ok(task);
        }
        task.history.push(
            HistoryEntry::new(actions::UPDATED, self.actor()).with_change(
                "blocked_by",
                Change::new(blocker_id, serde_json::Value::Null),
            ),
        );
        let task = self.save_task(&task).await?;
        self.maybe_release(task, actions::UNBLOCKED).await
    }

    /// Blockers of `task` that are not yet done. Dangling ids (deleted
    /// blockers) count as closed.
    pub async fn open_blockers(&self, task: &Task) -> Result<Vec<Task>> {
        let mut open = Vec::new();
        for blocker_id in &task.blocked_by {
            if let Some(record) = self
                .store()
                .find_by_id(collections::TASKS, blocker_id)
                .await?
            {
                let blocker: Task = serde_json::from_value(record)?;
                if blocker.column != COLUMN_DONE {
                    open.push(blocker);
                }
            }
        }
        Ok(open)
    }

    /// Called when `blocker` lands in `done`: release dependents whose last
    /// open dependency this was.
    pub(super) async fn on_blocker_completed(&self, blocker: &Task) -> Result<()> {
        for dependent in self.dependents_of(&blocker.id).await? {
            if let Err(e) = self
                .maybe_release(dependent.clone(), actions::UNBLOCKED_BY_COMPLETION)
                .await
            {
                tracing::warn!(
                    task = %dependent.id,
                    blocker = %blocker.id,
                    error = %e,
                    "Failed to release dependent"
                );
            }
        }
        Ok(())
    }

    /// Called when `blocker` leaves `done`: re-pause dependents.
    pub(super) async fn on_blocker_reopened(&self, blocker: &Task) -> Result<()> {
        for dependent in self.dependents_of(&blocker.id).await? {
            if dependent.is_paused() {
                continue;
            }
            if let Err(e) = self.pause_for_dependency(dependent.clone()).await {
                tracing::warn!(
                    task = %dependent.id,
                    blocker = %blocker.id,
                    error = %e,
                    "Failed to re-pause dependent"
                );
            }
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Move a task into `need_input` because of an unfinished dependency.
    /// `open_question` stays None so the completion cascade can tell this
    /// pause apart from an explicit block.
    async fn pause_for_dependency(&self, task: Task) -> Result<Task> {
        let siblings = self.column_tasks(&task.board, COLUMN_NEED_INPUT).await?;
        let positions: Vec<f64> = siblings
            .iter()
            .filter(|t| t.id != task.id)
            .map(|t| t.position)
            .collect();

        let mut task = task;
        let old_column = task.column.clone();
        task.history.push(
            HistoryEntry::new(actions::BLOCKED_BY_DEPENDENCY, self.actor())
                .with_change("column", Change::new(old_column.as_str(), COLUMN_NEED_INPUT)),
        );
        task.column = COLUMN_NEED_INPUT.to_string();
        task.position = crate::position::next(&positions);
        self.save_task(&task).await
    }

    /// Release a dependency-paused task into `todo` when no open blockers
    /// remain. Explicitly blocked tasks (open question pending) stay put.
    async fn maybe_release(&self, task: Task, action: &str) -> Result<Task> {
        if !task.is_paused() || task.open_question.is_some() {
            return Ok(task);
        }
        if !self.open_blockers(&task).await?.is_empty() {
            return Ok(task);
        }
        let siblings = self.column_tasks(&task.board, COLUMN_TODO).await?;
        let positions: Vec<f64> = siblings
            .iter()
            .filter(|t| t.id != task.id)
            .map(|t| t.position)
            .collect();
        let mut task = task;
        task.history.push(
            HistoryEntry::new(action, self.actor())
                .with_change("column", Change::new(COLUMN_NEED_INPUT, COLUMN_TODO)),
        );
        task.column = COLUMN_TODO.to_string();
        task.position = crate::position::next(&positions);
        self.save_task(&task).await
    }

    /// Tasks that list `blocker_id` in their `blocked_by` set
    async fn dependents_of(&self, blocker_id: &str) -> Result<Vec<Task>> {
        let records = self
            .store()
            .find_by_filter(collections::TASKS, &Filter::new())
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|r| serde_json::from_value::<Task>(r).ok())
            .filter(|t| t.blocked_by.contains(blocker_id))
            .collect())
    }

    /// DFS over stored `blocked_by` edges: can `from` reach `to`?
    /// Visited set bounds the walk to O(V+E).
    async fn reaches(&self, from: &str, to: &str) -> Result<bool> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(current) = stack.pop() {
            if current == to {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(record) = self
                .store()
                .find_by_id(collections::TASKS, &current)
                .await?
            {
                if let Ok(task) = serde_json::from_value::<Task>(record) {
                    stack.extend(task.blocked_by.iter().cloned());
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{NewTask, Placement};
    use crate::store::LocalStore;

    async fn graph_with_board() -> (TaskGraph, String) {
        let store = Arc::new(LocalStore::in_memory());
        let graph = TaskGraph::new(store, "user");
        let board = graph.create_board("Work", "WRK").await.unwrap();
        (graph, board.id)
    }

    async fn quick_task(graph: &TaskGraph, board: &str, title: &str) -> Task {
        graph
            .create_task(NewTask {
                board: board.to_string(),
                title: title.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    /// Scenario 2: block pauses the task, writes the question as an agent
    /// comment, and records history
    #[tokio::test]
    async fn test_block_pauses_with_comment_and_history() {
        let (graph, board) = graph_with_board().await;
        let task = quick_task(&graph, &board, "Fix login").await;
        let task = graph
            .move_task(&task.id, "in_progress", Placement::End)
            .await
            .unwrap();

        let blocked = graph
            .block(&task.id, "use JWT or sessions?")
            .await
            .unwrap();
        assert_eq!(blocked.column, COLUMN_NEED_INPUT);
        assert_eq!(blocked.open_question.as_deref(), Some("use JWT or sessions?"));
        assert!(blocked
            .history
            .iter()
            .any(|h| h.action == actions::BLOCKED));

        let comments = graph.list_comments(&blocked.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "use JWT or sessions?");
        assert_eq!(comments[0].author_type, AuthorType::Agent);
    }

    #[tokio::test]
    async fn test_block_is_idempotent_per_pending_reason() {
        let (graph, board) = graph_with_board().await;
        let task = quick_task(&graph, &board, "t").await;

        graph.block(&task.id, "question?").await.unwrap();
        graph.block(&task.id, "question?").await.unwrap();

        let comments = graph.list_comments(&task.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        let task = graph.get_task(&task.id).await.unwrap();
        assert_eq!(
            task.history
                .iter()
                .filter(|h| h.action == actions::BLOCKED)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_unblock_returns_to_prior_column() {
        let (graph, board) = graph_with_board().await;
        let task = quick_task(&graph, &board, "t").await;
        let task = graph
            .move_task(&task.id, "in_progress", Placement::End)
            .await
            .unwrap();
        graph.block(&task.id, "q?").await.unwrap();

        let resumed = graph.unblock(&task.id).await.unwrap();
        assert_eq!(resumed.column, "in_progress");
        assert!(resumed.open_question.is_none());
    }

    #[tokio::test]
    async fn test_unblock_requires_need_input() {
        let (graph, board) = graph_with_board().await;
        let task = quick_task(&graph, &board, "t").await;
        assert!(matches!(
            graph.unblock(&task.id).await,
            Err(CoreError::Validation(_))
        ));
    }

    /// P4: self-block rejected
    #[tokio::test]
    async fn test_self_block_rejected() {
        let (graph, board) = graph_with_board().await;
        let task = quick_task(&graph, &board, "t").await;
        assert!(matches!(
            graph.add_blocked_by(&task.id, &task.id).await,
            Err(CoreError::Validation(_))
        ));
    }

    /// P4: cycles rejected, including transitive ones
    #[tokio::test]
    async fn test_cycle_rejected() {
        let (graph, board) = graph_with_board().await;
        let a = quick_task(&graph, &board, "a").await;
        let b = quick_task(&graph, &board, "b").await;
        let c = quick_task(&graph, &board, "c").await;

        graph.add_blocked_by(&b.id, &a.id).await.unwrap();
        graph.add_blocked_by(&c.id, &b.id).await.unwrap();

        // a → c would close a cycle a ← b ← c
        assert!(matches!(
            graph.add_blocked_by(&a.id, &c.id).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_dependency_pauses_dependent() {
        let (graph, board) = graph_with_board().await;
        let a = quick_task(&graph, &board, "a").await;
        let b = quick_task(&graph, &board, "b").await;

        let b = graph.add_blocked_by(&b.id, &a.id).await.unwrap();
        let b = graph.get_task(&b.id).await.unwrap();
        assert_eq!(b.column, COLUMN_NEED_INPUT);
        assert!(b.open_question.is_none());
    }

    /// Scenario 4: completing the blocker releases dependents to todo;
    /// reopening it re-pauses them
    #[tokio::test]
    async fn test_completion_cascade_both_directions() {
        let (graph, board) = graph_with_board().await;
        let a = quick_task(&graph, &board, "a").await;
        let b = quick_task(&graph, &board, "b").await;
        let c = quick_task(&graph, &board, "c").await;
        graph.add_blocked_by(&b.id, &a.id).await.unwrap();
        graph.add_blocked_by(&c.id, &a.id).await.unwrap();

        graph
            .move_task(&a.id, COLUMN_DONE, Placement::End)
            .await
            .unwrap();
        for id in [&b.id, &c.id] {
            let task = graph.get_task(id).await.unwrap();
            assert_eq!(task.column, COLUMN_TODO, "task {id} should be released");
            assert!(task
                .history
                .iter()
                .any(|h| h.action == actions::UNBLOCKED_BY_COMPLETION));
        }

        graph
            .move_task(&a.id, "in_progress", Placement::End)
            .await
            .unwrap();
        for id in [&b.id, &c.id] {
            let task = graph.get_task(id).await.unwrap();
            assert_eq!(task.column, COLUMN_NEED_INPUT, "task {id} should re-pause");
        }
    }

    /// P4: completion does not release a task with its own open question
    #[tokio::test]
    async fn test_completion_keeps_explicitly_blocked_tasks_paused() {
        let (graph, board) = graph_with_board().await;
        let a = quick_task(&graph, &board, "a").await;
        let b = quick_task(&graph, &board, "b").await;
        graph.add_blocked_by(&b.id, &a.id).await.unwrap();
        graph.block(&b.id, "also need a decision").await.unwrap();

        graph
            .move_task(&a.id, COLUMN_DONE, Placement::End)
            .await
            .unwrap();
        let b = graph.get_task(&b.id).await.unwrap();
        assert_eq!(b.column, COLUMN_NEED_INPUT);
        assert!(b.open_question.is_some());
    }

    /// P4: removing the last open dependency releases the dependent
    #[tokio::test]
    async fn test_remove_last_dependency_releases() {
        let (graph, board) = graph_with_board().await;
        let a = quick_task(&graph, &board, "a").await;
        let b = quick_task(&graph, &board, "b").await;
        graph.add_blocked_by(&b.id, &a.id).await.unwrap();

        let b = graph.remove_blocked_by(&b.id, &a.id).await.unwrap();
        let b = graph.get_task(&b.id).await.unwrap();
        assert_eq!(b.column, COLUMN_TODO);
    }

    #[tokio::test]
    async fn test_plain_move_into_need_input_rejected_without_reason() {
        let (graph, board) = graph_with_board().await;
        let task = quick_task(&graph, &board, "t").await;
        assert!(matches!(
            graph
                .move_task(&task.id, COLUMN_NEED_INPUT, Placement::End)
                .await,
            Err(CoreError::Validation(_))
        ));
    }
}
