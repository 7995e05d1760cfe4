//! Task records, history entries, and the embedded agent session

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::{AgentTool, RefType};

/// Column keys the core attaches semantics to. All other columns are plain
/// string keys owned by the board.
pub const COLUMN_NEED_INPUT: &str = "need_input";
pub const COLUMN_TODO: &str = "todo";
pub const COLUMN_DONE: &str = "done";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Bug,
    #[default]
    Feature,
    Chore,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Chore => "chore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bug" => Some(Self::Bug),
            "feature" => Some(Self::Feature),
            "chore" => Some(Self::Chore),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Which surface created a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    #[default]
    User,
    Agent,
    Cli,
    Tui,
}

impl CreatedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Cli => "cli",
            Self::Tui => "tui",
        }
    }
}

/// Binding between a task and an external agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSession {
    pub tool: AgentTool,
    pub external_ref: String,
    pub ref_type: RefType,
    pub working_dir: String,
    pub linked_at: DateTime<Utc>,
}

/// A single field change recorded in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub from: Value,
    #[serde(default)]
    pub to: Value,
}

impl Change {
    pub fn new(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Append-only audit entry. Consumers treat history as the source of truth
/// for what happened when; entries are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    #[serde(default)]
    pub changes: BTreeMap<String, Change>,
}

impl HistoryEntry {
    pub fn new(action: &str, actor: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.to_string(),
            actor: actor.to_string(),
            changes: BTreeMap::new(),
        }
    }

    pub fn with_change(mut self, field: &str, change: Change) -> Self {
        self.changes.insert(field.to_string(), change);
        self
    }
}

/// History actions the core emits
pub mod actions {
    pub const CREATED: &str = "created";
    pub const UPDATED: &str = "updated";
    pub const MOVED: &str = "moved";
    pub const BLOCKED: &str = "blocked";
    pub const UNBLOCKED: &str = "unblocked";
    pub const BLOCKED_BY_DEPENDENCY: &str = "blocked_by_dependency";
    pub const UNBLOCKED_BY_COMPLETION: &str = "unblocked_by_completion";
    pub const ORPHANED: &str = "orphaned";
    pub const SESSION_LINKED: &str = "session_linked";
    pub const SESSION_UNLINKED: &str = "session_unlinked";
}

/// A task on a board
///
/// Externally displayed as `PREFIX-seq`. `position` orders tasks within a
/// column; it is strictly positive and unique per column under the
/// single-writer assumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub board: String,
    #[serde(default)]
    pub seq: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub blocked_by: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_by: CreatedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_agent: Option<String>,
    /// Last open question from an explicit block, None when nothing pending.
    /// Distinguishes explicit pauses from dependency-driven ones: only
    /// dependency-driven pauses auto-clear when blockers complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_session: Option<AgentSession>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

impl Task {
    /// Display id, e.g. `WRK-12`
    pub fn display_id(&self, prefix: &str) -> String {
        super::format_display_id(prefix, self.seq)
    }

    /// True when the task sits in the pause column
    pub fn is_paused(&self) -> bool {
        self.column == COLUMN_NEED_INPUT
    }

    /// The column recorded by the most recent blocking history entry,
    /// i.e. where an unblock should return the task to.
    pub fn column_before_block(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|h| {
                h.action == actions::BLOCKED || h.action == actions::BLOCKED_BY_DEPENDENCY
            })
            .and_then(|h| h.changes.get("column"))
            .and_then(|c| c.from.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_entry(from: &str) -> HistoryEntry {
        HistoryEntry::new(actions::BLOCKED, "agent")
            .with_change("column", Change::new(from, COLUMN_NEED_INPUT))
    }

    #[test]
    fn test_column_before_block() {
        let mut task: Task = serde_json::from_value(serde_json::json!({
            "title": "t",
            "column": COLUMN_NEED_INPUT,
        }))
        .unwrap();
        assert_eq!(task.column_before_block(), None);

        task.history.push(blocked_entry("in_progress"));
        assert_eq!(task.column_before_block(), Some("in_progress"));

        // Most recent block wins
        task.history.push(blocked_entry("review"));
        assert_eq!(task.column_before_block(), Some("review"));
    }

    #[test]
    fn test_serde_defaults_tolerate_sparse_records() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "title": "minimal",
        }))
        .unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.task_type, TaskType::Feature);
        assert!(task.labels.is_empty());
        assert!(task.agent_session.is_none());
    }

    #[test]
    fn test_type_field_renamed() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "title": "t",
            "type": "bug",
        }))
        .unwrap();
        assert_eq!(task.task_type, TaskType::Bug);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], "bug");
    }
}
