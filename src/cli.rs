//! CLI argument parsing
//!
//! Uses clap derive macros. Running without a subcommand starts the TUI;
//! subcommands run the same core operations headlessly and print plain
//! text, so agents and scripts can drive the tracker without a terminal UI.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Local-first kanban task tracker with agent pause/resume
#[derive(Parser, Debug)]
#[command(name = "egenskriven")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of the shared record API
    #[arg(
        long,
        env = "EGENSKRIVEN_API",
        default_value = "http://127.0.0.1:8090",
        global = true
    )]
    pub api: String,

    /// Project root holding .egenskriven/ (default: current directory)
    #[arg(long, env = "EGENSKRIVEN_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Board prefix to operate on (default: config default_board)
    #[arg(short, long, env = "EGENSKRIVEN_BOARD", global = true)]
    pub board: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task to the active board
    Add {
        /// Task title
        title: String,
        /// Free-text description (markdown permitted)
        #[arg(short, long, default_value = "")]
        description: String,
        /// Task type: bug, feature, chore
        #[arg(short = 't', long)]
        task_type: Option<String>,
        /// Priority: low, medium, high, urgent
        #[arg(short, long)]
        priority: Option<String>,
        /// Column (default: the board's first column)
        #[arg(short, long)]
        column: Option<String>,
        /// Labels (repeatable)
        #[arg(short, long)]
        label: Vec<String>,
        /// Due date, ISO 8601
        #[arg(long)]
        due: Option<String>,
    },

    /// Update fields on a task
    Update {
        /// Task reference: record id or display id (WRK-3)
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short = 't', long)]
        task_type: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Move a task to a column
    Move {
        task: String,
        column: String,
        /// Insert at this display index instead of appending
        #[arg(long)]
        at: Option<usize>,
    },

    /// Delete a task
    Delete {
        task: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Pause a task on a question for the human
    Block {
        task: String,
        /// The open question
        reason: String,
    },

    /// Return a paused task to the column it was blocked from
    Unblock { task: String },

    /// Comment on a task
    Comment {
        task: String,
        content: String,
        /// Author the comment as the agent instead of a human
        #[arg(long)]
        agent: bool,
    },

    /// Print (or execute) the resume command for a task's agent session
    Resume {
        task: String,
        /// Execute the command instead of printing it
        #[arg(long)]
        exec: bool,
    },

    /// Manage the agent session bound to a task
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// List tasks on the active board
    List {
        /// Only tasks waiting for input
        #[arg(long)]
        need_input: bool,
        /// Only tasks in this column
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Manage boards
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Bind an external agent session to a task
    Link {
        task: String,
        /// Tool: opencode, claude-code, codex
        tool: String,
        /// External session reference (>= 8 characters)
        external_ref: String,
        /// Working directory the session runs in
        #[arg(short, long, default_value = "")]
        dir: String,
    },
    /// Clear the session binding
    Unlink { task: String },
    /// Show the binding and session records
    Show { task: String },
}

#[derive(Subcommand, Debug)]
pub enum BoardAction {
    /// Create a board
    Create {
        name: String,
        /// 1-10 uppercase alphanumeric characters, globally unique
        prefix: String,
    },
    /// List boards
    List,
    /// Make a board this project's default
    Use { prefix: String },
    /// Update board settings
    Update {
        prefix: String,
        #[arg(long)]
        name: Option<String>,
        /// Resume policy: manual, command, auto
        #[arg(long)]
        resume_mode: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Delete the board; tasks are orphaned unless --cascade
        #[arg(long)]
        delete: bool,
        /// With --delete, also delete the board's tasks
        #[arg(long)]
        cascade: bool,
    },
}

/// Generate shell completions and print to stdout
pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "egenskriven", &mut io::stdout());
}
