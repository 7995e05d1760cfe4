//! Board records: column layout, sequence counter, resume policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, Result};

/// Default column layout for new boards
pub const DEFAULT_COLUMNS: [&str; 6] = [
    "backlog",
    "todo",
    "in_progress",
    "need_input",
    "review",
    "done",
];

/// How the orchestrator surfaces resume commands for tasks on this board
///
/// - `Manual`: render the shell line, the user copies and runs it
/// - `Command`: expose an explicit run action in the UI
/// - `Auto`: run the command unprompted when a resume trigger arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    Manual,
    #[default]
    Command,
    Auto,
}

impl ResumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Command => "command",
            Self::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "command" => Some(Self::Command),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// A kanban board owning tasks
///
/// `next_seq` is only ever advanced by the sequence allocator; a value of 0
/// marks a legacy record that gets initialized from the max observed seq on
/// first allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub id: String,
    pub prefix: String,
    pub name: String,
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub next_seq: u64,
    #[serde(default)]
    pub resume_mode: ResumeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|c| (*c).to_string()).collect()
}

impl Board {
    /// Build a new board with the default column layout
    pub fn new(name: &str, prefix: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("board name must not be empty"));
        }
        let prefix = prefix.to_ascii_uppercase();
        validate_prefix(&prefix)?;
        let now = Utc::now();
        Ok(Self {
            id: String::new(),
            prefix,
            name: name.to_string(),
            columns: default_columns(),
            next_seq: 1,
            resume_mode: ResumeMode::default(),
            color: None,
            created: now,
            updated: now,
        })
    }

    /// True if `column` is one of this board's configured columns
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The column new tasks land in
    pub fn first_column(&self) -> &str {
        self.columns.first().map_or("backlog", String::as_str)
    }
}

/// Validate a board prefix: 1-10 uppercase alphanumeric characters
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || prefix.len() > 10 {
        return Err(CoreError::validation(format!(
            "board prefix must be 1-10 characters, got {:?}",
            prefix
        )));
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(CoreError::validation(format!(
            "board prefix must be uppercase alphanumeric, got {:?}",
            prefix
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_defaults() {
        let board = Board::new("Work", "wrk").unwrap();
        assert_eq!(board.prefix, "WRK");
        assert_eq!(board.next_seq, 1);
        assert_eq!(board.resume_mode, ResumeMode::Command);
        assert_eq!(board.first_column(), "backlog");
        assert!(board.has_column("need_input"));
        assert_eq!(board.columns.len(), 6);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(Board::new("   ", "WRK").is_err());
    }

    #[test]
    fn test_prefix_validation() {
        assert!(validate_prefix("WRK").is_ok());
        assert!(validate_prefix("A1B2").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("TOOLONGPREFIX").is_err());
        assert!(validate_prefix("wrk").is_err());
        assert!(validate_prefix("W-K").is_err());
    }

    #[test]
    fn test_resume_mode_round_trip() {
        for mode in [ResumeMode::Manual, ResumeMode::Command, ResumeMode::Auto] {
            assert_eq!(ResumeMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(ResumeMode::parse("bogus"), None);
    }
}
