//! Off-loop commands
//!
//! Every blocking operation the update loop needs runs here as a spawned
//! task that reports back with a [`Message`]. Commands never touch `App`
//! state directly; they only read through the task graph and send results.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Message;
use crate::graph::{NewTask, Placement, TaskGraph};
use crate::model::{AuthorType, CreatedBy};
use crate::resume::ResumeCommand;
use crate::store::{HttpStore, RecordStore};
use crate::sync::poll::{Poller, POLL_INTERVAL};

/// Load a board and its tasks, reporting `BoardLoaded`
pub fn spawn_board_refresh(graph: Arc<TaskGraph>, board_id: String, tx: mpsc::Sender<Message>) {
    tokio::spawn(async move {
        let loaded = async {
            let board = graph.get_board(&board_id).await?;
            let tasks = graph.board_tasks(&board_id).await?;
            Ok::<_, crate::errors::CoreError>((board, tasks))
        }
        .await;
        let message = match loaded {
            Ok((board, tasks)) => Message::BoardLoaded {
                board: Box::new(board),
                tasks,
            },
            Err(e) => Message::Notice(format!("board refresh failed: {e}")),
        };
        let _ = tx.send(message).await;
    });
}

pub fn spawn_boards_load(graph: Arc<TaskGraph>, tx: mpsc::Sender<Message>) {
    tokio::spawn(async move {
        let message = match graph.list_boards().await {
            Ok(boards) => Message::BoardsLoaded(boards),
            Err(e) => Message::Notice(format!("board list failed: {e}")),
        };
        let _ = tx.send(message).await;
    });
}

pub fn spawn_detail_load(
    graph: Arc<TaskGraph>,
    task_id: String,
    generation: u64,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let loaded = async {
            let task = graph.get_task(&task_id).await?;
            let comments = graph.list_comments(&task_id).await?;
            Ok::<_, crate::errors::CoreError>((task, comments))
        }
        .await;
        let message = match loaded {
            Ok((task, comments)) => Message::DetailLoaded {
                generation,
                task: Box::new(task),
                comments,
            },
            Err(e) => Message::Notice(format!("task load failed: {e}")),
        };
        let _ = tx.send(message).await;
    });
}

/// Create a task from the form draft
pub fn spawn_task_create(
    graph: Arc<TaskGraph>,
    board_id: String,
    title: String,
    description: String,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let result = graph
            .create_task(NewTask {
                board: board_id,
                title,
                description,
                created_by: CreatedBy::Tui,
                ..Default::default()
            })
            .await;
        let _ = tx
            .send(Message::OpDone {
                label: "task created".to_string(),
                error: result.err().map(|e| e.to_string()),
            })
            .await;
    });
}

pub fn spawn_task_move(
    graph: Arc<TaskGraph>,
    task_id: String,
    column: String,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let result = graph.move_task(&task_id, &column, Placement::End).await;
        let _ = tx
            .send(Message::OpDone {
                label: format!("moved to {column}"),
                error: result.err().map(|e| e.to_string()),
            })
            .await;
    });
}

pub fn spawn_task_delete(graph: Arc<TaskGraph>, task_id: String, tx: mpsc::Sender<Message>) {
    tokio::spawn(async move {
        let result = graph.delete_task(&task_id).await;
        let _ = tx
            .send(Message::OpDone {
                label: "task deleted".to_string(),
                error: result.err().map(|e| e.to_string()),
            })
            .await;
    });
}

pub fn spawn_unblock(graph: Arc<TaskGraph>, task_id: String, tx: mpsc::Sender<Message>) {
    tokio::spawn(async move {
        let result = graph.unblock(&task_id).await;
        let _ = tx
            .send(Message::OpDone {
                label: "task unblocked".to_string(),
                error: result.err().map(|e| e.to_string()),
            })
            .await;
    });
}

pub fn spawn_comment(
    graph: Arc<TaskGraph>,
    task_id: String,
    content: String,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let result = graph
            .add_comment(&task_id, &content, AuthorType::Human)
            .await;
        let _ = tx
            .send(Message::OpDone {
                label: "comment added".to_string(),
                error: result.err().map(|e| e.to_string()),
            })
            .await;
    });
}

/// Bulk move: positions are allocated per task in selection order, so the
/// target column ends with the selection's relative order intact
pub fn spawn_bulk_move(
    graph: Arc<TaskGraph>,
    task_ids: Vec<String>,
    column: String,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let mut failed = 0usize;
        let total = task_ids.len();
        for task_id in task_ids {
            if let Err(e) = graph.move_task(&task_id, &column, Placement::End).await {
                tracing::warn!(task = %task_id, error = %e, "Bulk move failed for task");
                failed += 1;
            }
        }
        let error = (failed > 0).then(|| format!("{failed} of {total} tasks"));
        let _ = tx
            .send(Message::OpDone {
                label: format!("moved {} tasks to {column}", total - failed),
                error,
            })
            .await;
    });
}

/// Bulk delete with one aggregate result
pub fn spawn_bulk_delete(
    graph: Arc<TaskGraph>,
    task_ids: Vec<String>,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let mut failed = 0usize;
        let total = task_ids.len();
        for task_id in task_ids {
            if let Err(e) = graph.delete_task(&task_id).await {
                tracing::warn!(task = %task_id, error = %e, "Bulk delete failed for task");
                failed += 1;
            }
        }
        let error = (failed > 0).then(|| format!("{failed} of {total} tasks"));
        let _ = tx
            .send(Message::OpDone {
                label: format!("deleted {} tasks", total - failed),
                error,
            })
            .await;
    });
}

/// Assemble the context prompt and resume command for a task's session
pub fn spawn_build_resume(
    graph: Arc<TaskGraph>,
    task_id: String,
    execute: bool,
    tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let built = build_resume_for_task(&graph, &task_id).await;
        let message = match built {
            Ok(command) => Message::ResumeBuilt {
                command: Box::new(command),
                execute,
            },
            Err(e) => Message::Notice(format!("resume failed: {e}")),
        };
        let _ = tx.send(message).await;
    });
}

/// Shared by the TUI and the CLI `resume` command
pub async fn build_resume_for_task(
    graph: &TaskGraph,
    task_id: &str,
) -> crate::errors::Result<ResumeCommand> {
    let task = graph.get_task(task_id).await?;
    let session = task.agent_session.clone().ok_or_else(|| {
        crate::errors::CoreError::validation("task has no linked agent session")
    })?;
    let board = graph.get_board(&task.board).await?;
    let comments = graph.list_comments(&task.id).await?;

    let mut blockers = Vec::new();
    for blocker_id in &task.blocked_by {
        if let Ok(blocker) = graph.get_task(blocker_id).await {
            blockers.push((blocker.display_id(&board.prefix), blocker.title));
        }
    }

    let prompt = crate::resume::build_context(
        &board.prefix,
        &task,
        &comments,
        &blockers,
        chrono::Utc::now(),
    );
    crate::resume::build_resume(
        session.tool,
        &session.external_ref,
        &session.working_dir,
        &prompt,
    )
}

/// Exec the resume argv detached, in the session's working directory
pub fn execute_resume(command: &ResumeCommand) -> std::io::Result<()> {
    use std::process::{Command, Stdio};
    let mut proc = Command::new(&command.argv[0]);
    proc.args(&command.argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if !command.working_dir.is_empty() {
        proc.current_dir(&command.working_dir);
    }
    proc.spawn().map(|_| ())
}

/// Polling fallback loop: tick every 3 seconds, surface changed tasks, and
/// hand control back to live mode once the store host is healthy again.
/// Each polling session starts with a fresh watermark, which is exactly the
/// reset live re-establishment requires.
pub fn spawn_polling(
    store: Arc<dyn RecordStore>,
    api: HttpStore,
    board_id: String,
    tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut poller = Poller::new(store, &board_id);
        tracing::info!(board = %board_id, "Polling fallback started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(POLL_INTERVAL) => {}
            }
            // Failures are ignored; the poller keeps ticking
            if let Ok(Some(tasks)) = poller.tick().await {
                if !tasks.is_empty() && tx.send(Message::PollChanged(tasks)).await.is_err() {
                    break;
                }
            }
            if api.health().await {
                let _ = tx.send(Message::LiveRetry).await;
                break;
            }
        }
        tracing::debug!(board = %board_id, "Polling fallback stopped");
    });
}
