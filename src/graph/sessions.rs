//! Agent-session binding
//!
//! A task carries at most one embedded agent session; every link call also
//! appends a mirror record to the `sessions` collection so sessions can be
//! queried across tasks without scanning. Relinking abandons the previous
//! record, unlinking completes it.

use chrono::Utc;

use crate::errors::{CoreError, Result};
use crate::model::{
    actions, collections, validate_ref, AgentSession, AgentTool, Change, HistoryEntry, RefType,
    SessionRecord, SessionStatus, Task,
};
use crate::store::Filter;

use super::TaskGraph;

impl TaskGraph {
    /// Bind a task to an external agent session. Overwrites any existing
    /// binding; the prior mirror record is marked abandoned.
    pub async fn link_session(
        &self,
        task_id: &str,
        tool: &str,
        external_ref: &str,
        working_dir: &str,
    ) -> Result<Task> {
        let tool = AgentTool::parse(tool)?;
        validate_ref(external_ref)?;
        let mut task = self.load_task(task_id).await?;

        if task.agent_session.is_some() {
            self.close_latest_session(&task.id, SessionStatus::Abandoned)
                .await?;
        }

        let session = AgentSession {
            tool,
            external_ref: external_ref.to_string(),
            ref_type: RefType::infer(external_ref),
            working_dir: working_dir.to_string(),
            linked_at: Utc::now(),
        };
        task.history.push(
            HistoryEntry::new(actions::SESSION_LINKED, self.actor()).with_change(
                "agent_session",
                Change::new(serde_json::Value::Null, external_ref),
            ),
        );
        task.agent_session = Some(session.clone());
        let task = self.save_task(&task).await?;

        let record = SessionRecord {
            id: String::new(),
            task: task.id.clone(),
            tool: session.tool,
            external_ref: session.external_ref,
            ref_type: session.ref_type,
            working_dir: session.working_dir,
            status: SessionStatus::Active,
            created: Utc::now(),
        };
        self.store()
            .save(collections::SESSIONS, serde_json::to_value(&record)?)
            .await?;
        Ok(task)
    }

    /// Clear a task's session binding, completing the mirror record
    pub async fn unlink_session(&self, task_id: &str) -> Result<Task> {
        let mut task = self.load_task(task_id).await?;
        let Some(session) = task.agent_session.take() else {
            return Err(CoreError::validation("task has no linked session"));
        };
        task.history.push(
            HistoryEntry::new(actions::SESSION_UNLINKED, self.actor()).with_change(
                "agent_session",
                Change::new(session.external_ref.as_str(), serde_json::Value::Null),
            ),
        );
        let task = self.save_task(&task).await?;
        self.close_latest_session(&task.id, SessionStatus::Completed)
            .await?;
        Ok(task)
    }

    /// Session records for a task, newest first
    pub async fn task_sessions(&self, task_id: &str) -> Result<Vec<SessionRecord>> {
        let records = self
            .store()
            .find_by_filter(collections::SESSIONS, &Filter::new().eq("task", task_id))
            .await?;
        let mut sessions: Vec<SessionRecord> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value(r).ok())
            .collect();
        sessions.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(sessions)
    }

    /// Flip the latest open session record's status; no-op without one
    async fn close_latest_session(&self, task_id: &str, status: SessionStatus) -> Result<()> {
        let sessions = self.task_sessions(task_id).await?;
        let open = sessions.into_iter().find(|s| {
            matches!(s.status, SessionStatus::Active | SessionStatus::Paused)
        });
        if let Some(mut record) = open {
            record.status = status;
            self.store()
                .save(collections::SESSIONS, serde_json::to_value(&record)?)
                .await?;
        }
        Ok(())
    }

    /// Keep the session index in step with a pause (best-effort callers)
    pub(super) async fn mark_session_paused(&self, task: &Task) -> Result<()> {
        if task.agent_session.is_none() {
            return Ok(());
        }
        self.set_latest_session_status(&task.id, SessionStatus::Paused)
            .await
    }

    pub(super) async fn mark_session_active(&self, task: &Task) -> Result<()> {
        if task.agent_session.is_none() {
            return Ok(());
        }
        self.set_latest_session_status(&task.id, SessionStatus::Active)
            .await
    }

    async fn set_latest_session_status(
        &self,
        task_id: &str,
        status: SessionStatus,
    ) -> Result<()> {
        let sessions = self.task_sessions(task_id).await?;
        if let Some(mut record) = sessions.into_iter().next() {
            if record.status != status
                && !matches!(
                    record.status,
                    SessionStatus::Completed | SessionStatus::Abandoned
                )
            {
                record.status = status;
                self.store()
                    .save(collections::SESSIONS, serde_json::to_value(&record)?)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::NewTask;
    use crate::store::LocalStore;

    async fn graph_with_task() -> (TaskGraph, String) {
        let store = Arc::new(LocalStore::in_memory());
        let graph = TaskGraph::new(store, "user");
        let board = graph.create_board("Work", "WRK").await.unwrap();
        let task = graph
            .create_task(NewTask {
                board: board.id,
                title: "t".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (graph, task.id)
    }

    #[tokio::test]
    async fn test_link_sets_embedded_session_and_mirror_record() {
        let (graph, task_id) = graph_with_task().await;
        let task = graph
            .link_session(&task_id, "claude-code", "abc12345", "/proj")
            .await
            .unwrap();

        let session = task.agent_session.unwrap();
        assert_eq!(session.tool, AgentTool::ClaudeCode);
        assert_eq!(session.external_ref, "abc12345");
        assert_eq!(session.ref_type, RefType::Uuid);
        assert_eq!(session.working_dir, "/proj");

        let records = graph.task_sessions(&task_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_relink_abandons_prior_record() {
        let (graph, task_id) = graph_with_task().await;
        graph
            .link_session(&task_id, "claude-code", "abc12345", "/proj")
            .await
            .unwrap();
        graph
            .link_session(&task_id, "opencode", "def67890", "/proj")
            .await
            .unwrap();

        let records = graph.task_sessions(&task_id).await.unwrap();
        assert_eq!(records.len(), 2);
        let statuses: Vec<SessionStatus> = records.iter().map(|r| r.status).collect();
        assert!(statuses.contains(&SessionStatus::Active));
        assert!(statuses.contains(&SessionStatus::Abandoned));
    }

    #[tokio::test]
    async fn test_unlink_completes_record() {
        let (graph, task_id) = graph_with_task().await;
        graph
            .link_session(&task_id, "codex", "abc12345", "/proj")
            .await
            .unwrap();
        let task = graph.unlink_session(&task_id).await.unwrap();
        assert!(task.agent_session.is_none());

        let records = graph.task_sessions(&task_id).await.unwrap();
        assert_eq!(records[0].status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_short_ref_rejected() {
        let (graph, task_id) = graph_with_task().await;
        assert!(matches!(
            graph
                .link_session(&task_id, "claude-code", "short", "/proj")
                .await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let (graph, task_id) = graph_with_task().await;
        assert!(matches!(
            graph
                .link_session(&task_id, "cursor", "abc12345", "/proj")
                .await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_path_ref_type_inferred() {
        let (graph, task_id) = graph_with_task().await;
        let task = graph
            .link_session(&task_id, "opencode", "/home/u/.sessions/s1", "/proj")
            .await
            .unwrap();
        assert_eq!(task.agent_session.unwrap().ref_type, RefType::Path);
    }
}
