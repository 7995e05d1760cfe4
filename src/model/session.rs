//! Session records: the cross-task index mirroring embedded agent sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, Result};

/// Minimum length for an external session reference
pub const MIN_REF_LEN: usize = 8;

/// Supported agent tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentTool {
    #[serde(rename = "opencode")]
    OpenCode,
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "codex")]
    Codex,
}

impl AgentTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenCode => "opencode",
            Self::ClaudeCode => "claude-code",
            Self::Codex => "codex",
        }
    }

    /// Parse a tool name, rejecting unknown tools with `Validation`
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "opencode" => Ok(Self::OpenCode),
            "claude-code" => Ok(Self::ClaudeCode),
            "codex" => Ok(Self::Codex),
            other => Err(CoreError::validation(format!(
                "unknown agent tool {other:?}; supported: opencode, claude-code, codex"
            ))),
        }
    }
}

/// Whether the external reference is a session uuid or a filesystem path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Uuid,
    Path,
}

impl RefType {
    /// Infer the reference type: anything with a path separator is a path
    pub fn infer(external_ref: &str) -> Self {
        if external_ref.contains('/') || external_ref.contains('\\') {
            Self::Path
        } else {
            Self::Uuid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Read-side session index record, one per link call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub id: String,
    pub task: String,
    pub tool: AgentTool,
    pub external_ref: String,
    pub ref_type: RefType,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

/// Validate an external session reference length
pub fn validate_ref(external_ref: &str) -> Result<()> {
    if external_ref.len() < MIN_REF_LEN {
        return Err(CoreError::validation(format!(
            "session reference must be at least {MIN_REF_LEN} characters, got {}",
            external_ref.len()
        )));
    }
    Ok(())
}
