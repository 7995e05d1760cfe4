//! Context prompt assembly
//!
//! When an agent session is resumed, the prompt it receives is rebuilt from
//! the task record, its comments, and its history. The builder is a pure
//! function: identical inputs (including the `now` used for relative
//! timestamps) produce byte-identical output, so equality tests are
//! meaningful.

mod command;

pub use command::{build_resume, shell_quote, ResumeCommand};

use chrono::{DateTime, Utc};

use crate::model::{Comment, HistoryEntry, Task};

/// History entries included in the prompt tail
const HISTORY_WINDOW: usize = 20;

/// Closing directive appended to every context prompt
const DIRECTIVE: &str = "Continue from where you left off; the user has responded above.";

/// A blocker reference resolved by the caller: display id + title
pub type BlockerRef = (String, String);

/// Assemble the resume context prompt for a task.
///
/// `comments` must be ordered by creation time; `blockers` carries one entry
/// per id in the task's `blocked_by` set. `now` anchors the relative
/// timestamps and is passed explicitly to keep the function pure.
pub fn build_context(
    board_prefix: &str,
    task: &Task,
    comments: &[Comment],
    blockers: &[BlockerRef],
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Task: {} — {}\n",
        task.display_id(board_prefix),
        task.title
    ));
    out.push_str(&format!("Column: {}\n", task.column));
    if task.is_paused() {
        let question = task.open_question.as_deref().unwrap_or("(blocked)");
        out.push_str(&format!("Status: need_input — {question}\n"));
    }

    out.push_str("\nDescription:\n");
    if task.description.is_empty() {
        out.push_str("(none)\n");
    } else {
        out.push_str(&task.description);
        if !task.description.ends_with('\n') {
            out.push('\n');
        }
    }

    out.push_str("\nOpen blockers:\n");
    if blockers.is_empty() {
        out.push_str("(none)\n");
    } else {
        for (display_id, title) in blockers {
            out.push_str(&format!("- {display_id} — {title}\n"));
        }
    }

    out.push_str("\nConversation:\n");
    if comments.is_empty() {
        out.push_str("(no comments)\n");
    } else {
        for comment in comments {
            out.push_str(&format!(
                "[{}, {}] {}\n",
                comment.author_type.as_str(),
                relative_time(comment.created, now),
                comment.content
            ));
        }
    }

    out.push_str("\nRecent history:\n");
    let start = task.history.len().saturating_sub(HISTORY_WINDOW);
    for entry in &task.history[start..] {
        out.push_str(&format!("- {}\n", render_history(entry, now)));
    }

    out.push('\n');
    out.push_str(DIRECTIVE);
    out.push('\n');
    out
}

fn render_history(entry: &HistoryEntry, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{}: {} by {}",
        relative_time(entry.timestamp, now),
        entry.action,
        entry.actor
    );
    if !entry.changes.is_empty() {
        let changes: Vec<String> = entry
            .changes
            .iter()
            .map(|(field, change)| {
                format!("{field}: {} → {}", terse(&change.from), terse(&change.to))
            })
            .collect();
        line.push_str(&format!(" ({})", changes.join(", ")));
    }
    line
}

/// Compact rendering of a history change value
fn terse(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "∅".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coarse relative timestamp: "just now", "5m ago", "3h ago", "2d ago"
fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{actions, AuthorType, Change, COLUMN_NEED_INPUT};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap()
    }

    fn sample_task() -> Task {
        let mut task: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "board": "b1",
            "seq": 1,
            "title": "Fix login",
            "description": "Users cannot log in.",
            "column": COLUMN_NEED_INPUT,
            "position": 1000.0,
            "open_question": "use JWT or sessions?",
        }))
        .unwrap();
        task.history.push({
            let mut entry = HistoryEntry::new(actions::BLOCKED, "agent").with_change(
                "column",
                Change::new("in_progress", COLUMN_NEED_INPUT),
            );
            entry.timestamp = fixed_now() - chrono::Duration::minutes(5);
            entry
        });
        task
    }

    fn sample_comments() -> Vec<Comment> {
        let mut question = Comment::new("t1", "use JWT or sessions?", AuthorType::Agent);
        question.created = fixed_now() - chrono::Duration::minutes(5);
        let mut answer = Comment::new("t1", "@agent use JWT", AuthorType::Human);
        answer.created = fixed_now() - chrono::Duration::minutes(2);
        vec![question, answer]
    }

    /// P7: byte-identical output for identical inputs
    #[test]
    fn test_prompt_is_deterministic() {
        let task = sample_task();
        let comments = sample_comments();
        let now = fixed_now();
        let a = build_context("WRK", &task, &comments, &[], now);
        let b = build_context("WRK", &task, &comments, &[], now);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let task = sample_task();
        let comments = sample_comments();
        let blockers = vec![("WRK-2".to_string(), "Provision database".to_string())];
        let prompt = build_context("WRK", &task, &comments, &blockers, fixed_now());

        let indices: Vec<usize> = [
            "Task: WRK-1 — Fix login",
            "Column: need_input",
            "Status: need_input — use JWT or sessions?",
            "Description:",
            "Open blockers:",
            "- WRK-2 — Provision database",
            "Conversation:",
            "[agent, 5m ago] use JWT or sessions?",
            "[human, 2m ago] @agent use JWT",
            "Recent history:",
            "Continue from where you left off; the user has responded above.",
        ]
        .iter()
        .map(|needle| prompt.find(needle).unwrap_or_else(|| panic!("missing {needle:?}")))
        .collect();
        assert!(
            indices.windows(2).all(|w| w[0] < w[1]),
            "sections out of order in:\n{prompt}"
        );
    }

    #[test]
    fn test_history_window_caps_at_twenty() {
        let mut task = sample_task();
        task.history.clear();
        for i in 0..30 {
            let mut entry = HistoryEntry::new(actions::UPDATED, "user");
            entry.timestamp = fixed_now() - chrono::Duration::minutes(40 - i);
            task.history.push(entry);
        }
        let prompt = build_context("WRK", &task, &[], &[], fixed_now());
        let lines = prompt
            .lines()
            .filter(|l| l.starts_with("- ") && l.contains("updated"))
            .count();
        assert_eq!(lines, 20);
    }

    #[test]
    fn test_unblocked_task_has_no_status_line() {
        let mut task = sample_task();
        task.column = "in_progress".to_string();
        task.open_question = None;
        let prompt = build_context("WRK", &task, &[], &[], fixed_now());
        assert!(!prompt.contains("Status: need_input"));
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = fixed_now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - chrono::Duration::minutes(5), now), "5m ago");
        assert_eq!(relative_time(now - chrono::Duration::hours(3), now), "3h ago");
        assert_eq!(relative_time(now - chrono::Duration::days(2), now), "2d ago");
        // Clock skew clamps to "just now" rather than going negative
        assert_eq!(relative_time(now + chrono::Duration::minutes(1), now), "just now");
    }
}
