//! Task comments
//!
//! Comments are immutable after write and ordered by `created`. A human
//! comment mentioning `@agent` is the resume trigger for boards running in
//! auto resume mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mention token that turns a human comment into a resume trigger
const AGENT_MENTION: &str = "@agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    #[default]
    Human,
    Agent,
}

impl AuthorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    pub task: String,
    pub content: String,
    #[serde(default)]
    pub author_type: AuthorType,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl Comment {
    pub fn new(task: &str, content: &str, author_type: AuthorType) -> Self {
        Self {
            id: String::new(),
            task: task.to_string(),
            content: content.to_string(),
            author_type,
            created: Utc::now(),
        }
    }

    /// True when this comment should resume a bound agent session on an
    /// auto-mode board: human-authored and mentioning `@agent`.
    pub fn is_resume_trigger(&self) -> bool {
        self.author_type == AuthorType::Human && self.content.contains(AGENT_MENTION)
    }
}
