//! Project configuration and UI constants
//!
//! One config document per project at `.egenskriven/config.toml`. The core
//! treats it as advisory input: clients read it to resolve the active board
//! on start and to override agent behaviour; nothing in the task graph
//! depends on it.

use std::path::{Path, PathBuf};

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Project-relative directory holding config and local store data
pub const PROJECT_DIR: &str = ".egenskriven";

/// How much process the workflow demands of agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    Strict,
    #[default]
    Light,
    Minimal,
}

/// How independently a bound agent is expected to act
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Autonomous,
    #[default]
    Collaborative,
    Supervised,
}

/// Agent behaviour overrides, read by integrations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub mode: AgentMode,
    pub override_todo_write: bool,
    pub require_summary: bool,
    pub structured_sections: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EgenConfig {
    /// Board prefix resolved as the active board on start
    pub default_board: Option<String>,
    pub workflow_mode: WorkflowMode,
    pub agent: AgentConfig,
}

impl EgenConfig {
    /// Load from `.egenskriven/config.toml` under `project_root`.
    /// A missing or unreadable file yields the defaults.
    pub fn load(project_root: &Path) -> Self {
        let path = Self::path(project_root);
        match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist to `.egenskriven/config.toml`, creating the directory
    pub fn save(&self, project_root: &Path) -> std::io::Result<()> {
        let dir = project_root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir)?;
        let text = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(Self::path(project_root), text)
    }

    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join("config.toml")
    }

    /// Local store data directory for this project
    pub fn data_dir(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join("data")
    }
}

/// Tokyo Night color palette
pub mod colors {
    use super::Color;

    pub const BG: Color = Color::Rgb(26, 27, 38); // #1a1b26
    pub const FG: Color = Color::Rgb(192, 202, 245); // #c0caf5
    pub const BORDER: Color = Color::Rgb(59, 66, 97); // #3b4261
    pub const HIGHLIGHT: Color = Color::Rgb(187, 154, 247); // #bb9af7 purple
    pub const DIM: Color = Color::Rgb(86, 95, 137); // #565f89 gray
    pub const NEED_INPUT: Color = Color::Rgb(255, 158, 100); // #ff9e64 orange
    pub const IN_PROGRESS: Color = Color::Rgb(122, 162, 247); // #7aa2f7 blue
    pub const DONE: Color = Color::Rgb(158, 206, 106); // #9ece6a green
    pub const URGENT: Color = Color::Rgb(247, 118, 142); // #f7768e red
}
