//! Record types shared across the store, the task graph, and the UI
//!
//! Every type here round-trips through serde_json because the store is a
//! black-box document interface. Unknown fields are tolerated on read so a
//! newer store schema does not break older clients.

mod board;
mod comment;
mod display_id;
mod epic;
mod session;
mod task;

pub use board::{Board, ResumeMode, DEFAULT_COLUMNS};
pub use comment::{AuthorType, Comment};
pub use display_id::{format_display_id, parse_display_id};
pub use epic::Epic;
pub use session::{validate_ref, AgentTool, RefType, SessionRecord, SessionStatus};
pub use task::{
    actions, AgentSession, Change, CreatedBy, HistoryEntry, Priority, Task, TaskType,
    COLUMN_DONE, COLUMN_NEED_INPUT, COLUMN_TODO,
};

/// Store collection names
pub mod collections {
    pub const BOARDS: &str = "boards";
    pub const TASKS: &str = "tasks";
    pub const EPICS: &str = "epics";
    pub const COMMENTS: &str = "comments";
    pub const SESSIONS: &str = "sessions";
}
