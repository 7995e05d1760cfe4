//! Interactive orchestrator
//!
//! A single-threaded cooperative update loop: keyboard input, realtime
//! events, timer ticks, and command completions all arrive as [`Message`]s
//! on one mailbox, and all shared mutable state lives in [`App`]. Blocking
//! work (store calls, HTTP, resume execution) runs in spawned tasks that
//! report back as messages; see `operations.rs`.

mod keyboard;
pub mod operations;
mod resume_policy;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::EgenConfig;
use crate::graph::TaskGraph;
use crate::model::{Board, Comment, ResumeMode, Task};
use crate::resume::ResumeCommand;
use crate::store::HttpStore;
use crate::sync::stream::{StreamClient, EVENT_QUEUE_CAPACITY};
use crate::sync::{ConnState, SyncUpdate};

/// How long a status message stays in the footer
const STATUS_TTL_SECS: u64 = 5;

/// Top-level views. Transitions happen only through explicit messages; keys
/// destined for another view are rejected by the per-view handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Board,
    TaskDetail,
    TaskForm,
    ConfirmDialog,
    BoardSelector,
}

/// Everything the update loop consumes
#[derive(Debug)]
pub enum Message {
    /// Keyboard input
    Key(crossterm::event::KeyEvent),
    /// Live-sync plane update (stream state, record event, mode changes)
    Sync(SyncUpdate),
    /// Periodic tick for elapsed-time displays and status expiry
    Tick,
    /// Board refresh completed
    BoardLoaded {
        board: Box<Board>,
        tasks: Vec<Task>,
    },
    /// Board list loaded for the selector
    BoardsLoaded(Vec<Board>),
    /// Task detail loaded; stale generations are discarded
    DetailLoaded {
        generation: u64,
        task: Box<Task>,
        comments: Vec<Comment>,
    },
    /// Polling fallback observed changed tasks
    PollChanged(Vec<Task>),
    /// Health probe succeeded while polling; live mode may be re-established
    LiveRetry,
    /// A resume command is ready; `execute` distinguishes run from render
    ResumeBuilt {
        command: Box<ResumeCommand>,
        execute: bool,
    },
    /// An off-loop mutation finished
    OpDone {
        label: String,
        error: Option<String>,
    },
    /// Status-line notice
    Notice(String),
}

/// Draft state for the task form overlay
#[derive(Debug, Default, Clone)]
pub struct FormState {
    pub title: String,
    pub description: String,
    pub editing_description: bool,
}

/// Pending confirmation dialog
#[derive(Debug, Clone)]
pub struct ConfirmState {
    pub message: String,
    pub action: ConfirmAction,
}

#[derive(Debug, Clone)]
pub enum ConfirmAction {
    DeleteTask(String),
    BulkDelete(Vec<String>),
}

/// Task detail view state
#[derive(Debug, Clone)]
pub struct DetailState {
    pub task: Task,
    pub comments: Vec<Comment>,
    pub comment_input: String,
    pub editing_comment: bool,
}

pub struct App {
    pub graph: Arc<TaskGraph>,
    pub api: HttpStore,
    pub config: EgenConfig,
    pub project_root: PathBuf,

    pub view: View,
    pub board: Option<Board>,
    pub tasks: Vec<Task>,
    pub boards: Vec<Board>,
    pub selected_column: usize,
    pub selected_card: usize,
    pub selector_index: usize,
    /// Task id → selection order, for order-preserving bulk operations
    pub selection: HashMap<String, usize>,
    next_selection_order: usize,

    pub form: FormState,
    pub confirm: Option<ConfirmState>,
    pub detail: Option<DetailState>,
    /// Bumped when the detail overlay closes so late loads are discarded
    detail_generation: u64,

    pub conn_state: ConnState,
    pub status_message: Option<(String, Instant)>,
    pub should_quit: bool,
    pub needs_render: bool,

    tx: mpsc::Sender<Message>,
    stream_cancel: Option<CancellationToken>,
    poll_cancel: Option<CancellationToken>,
}

impl App {
    pub fn new(
        graph: Arc<TaskGraph>,
        api: HttpStore,
        config: EgenConfig,
        project_root: PathBuf,
        tx: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            graph,
            api,
            config,
            project_root,
            view: View::Board,
            board: None,
            tasks: Vec::new(),
            boards: Vec::new(),
            selected_column: 0,
            selected_card: 0,
            selector_index: 0,
            selection: HashMap::new(),
            next_selection_order: 0,
            form: FormState::default(),
            confirm: None,
            detail: None,
            detail_generation: 0,
            conn_state: ConnState::Disconnected,
            status_message: None,
            should_quit: false,
            needs_render: true,
            tx,
            stream_cancel: None,
            poll_cancel: None,
        }
    }

    /// Show a status message in the footer (expires after a few seconds)
    pub fn show_status(&mut self, msg: &str) {
        self.status_message = Some((msg.to_string(), Instant::now()));
        self.needs_render = true;
    }

    /// Start (or restart) the realtime stream client
    pub fn start_stream(&mut self) {
        self.stop_stream();
        let cancel = CancellationToken::new();
        let (sync_tx, mut sync_rx) = mpsc::channel::<SyncUpdate>(EVENT_QUEUE_CAPACITY);
        let client = StreamClient::new(self.api.base_url(), sync_tx, cancel.clone());
        tokio::spawn(client.run());

        // Bridge the sync queue into the mailbox, one event per receive
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(update) = sync_rx.recv().await {
                if tx.send(Message::Sync(update)).await.is_err() {
                    break;
                }
            }
        });
        self.stream_cancel = Some(cancel);
    }

    /// Idempotent disconnect: cancels in-flight reads, leaves the mailbox
    /// usable for the next session
    pub fn stop_stream(&mut self) {
        if let Some(cancel) = self.stream_cancel.take() {
            cancel.cancel();
        }
    }

    fn start_polling(&mut self) {
        self.stop_polling();
        let Some(board) = &self.board else { return };
        let cancel = CancellationToken::new();
        operations::spawn_polling(
            self.graph.store().clone(),
            self.api.clone(),
            board.id.clone(),
            self.tx.clone(),
            cancel.clone(),
        );
        self.poll_cancel = Some(cancel);
    }

    fn stop_polling(&mut self) {
        if let Some(cancel) = self.poll_cancel.take() {
            cancel.cancel();
        }
    }

    pub fn shutdown(&mut self) {
        self.stop_stream();
        self.stop_polling();
    }

    /// Handle one mailbox message
    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::Key(key) => {
                self.handle_key(key);
                self.needs_render = true;
            }
            Message::Tick => {
                if let Some((_, since)) = &self.status_message {
                    if since.elapsed().as_secs() >= STATUS_TTL_SECS {
                        self.status_message = None;
                    }
                }
                self.needs_render = true;
            }
            Message::Sync(update) => self.handle_sync(update),
            Message::BoardLoaded { board, tasks } => {
                self.board = Some(*board);
                self.tasks = tasks;
                self.clamp_selection();
                self.needs_render = true;
            }
            Message::BoardsLoaded(boards) => {
                self.boards = boards;
                self.selector_index = self.selector_index.min(self.boards.len().saturating_sub(1));
                self.needs_render = true;
            }
            Message::DetailLoaded {
                generation,
                task,
                comments,
            } => {
                // A stale load races a closed overlay; drop it
                if generation == self.detail_generation && self.view == View::TaskDetail {
                    self.detail = Some(DetailState {
                        task: *task,
                        comments,
                        comment_input: String::new(),
                        editing_comment: false,
                    });
                    self.needs_render = true;
                }
            }
            Message::PollChanged(tasks) => {
                if !tasks.is_empty() {
                    self.refresh_board();
                }
            }
            Message::LiveRetry => {
                tracing::info!("Store healthy again, re-establishing live mode");
                self.stop_polling();
                self.start_stream();
            }
            Message::ResumeBuilt { command, execute } => {
                self.handle_resume_built(*command, execute);
            }
            Message::OpDone { label, error } => {
                match error {
                    Some(error) => self.show_status(&format!("{label} failed: {error}")),
                    None => self.show_status(&label),
                }
                self.refresh_board();
                self.refresh_detail_if_open();
            }
            Message::Notice(text) => self.show_status(&text),
        }
    }

    fn handle_sync(&mut self, update: SyncUpdate) {
        match update {
            SyncUpdate::State(state) => {
                self.conn_state = state;
                self.needs_render = true;
            }
            SyncUpdate::Event(event) => {
                // Events and poll results are both just refresh triggers;
                // view state is re-derived from the store
                match event.collection.as_str() {
                    "comments" => self.handle_comment_event(&event),
                    "tasks" | "boards" | "epics" => {}
                    other => {
                        tracing::debug!(collection = other, "Ignoring unsubscribed event");
                        return;
                    }
                }
                self.refresh_board();
                self.refresh_detail_if_open();
            }
            SyncUpdate::LiveLost => {
                self.show_status("live sync lost, polling");
                self.start_polling();
            }
            SyncUpdate::LiveEstablished => {
                // The fresh stream is authoritative: stop the poller (its
                // watermark dies with it) and re-derive state once
                self.stop_polling();
                self.refresh_board();
            }
        }
    }

    // ── Derived view state ───────────────────────────────────────────────

    /// Column keys of the active board
    pub fn columns(&self) -> Vec<String> {
        self.board
            .as_ref()
            .map(|b| b.columns.clone())
            .unwrap_or_default()
    }

    /// Tasks of one column, already sorted by position
    pub fn column_tasks(&self, column: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().filter(|t| t.column == column).collect();
        tasks.sort_by(|a, b| a.position.total_cmp(&b.position));
        tasks
    }

    /// Currently highlighted task, if any
    pub fn selected_task(&self) -> Option<&Task> {
        let columns = self.columns();
        let column = columns.get(self.selected_column)?;
        self.column_tasks(column).get(self.selected_card).copied()
    }

    /// Selected task ids in the order they were selected
    pub fn selection_in_order(&self) -> Vec<String> {
        let mut ids: Vec<(&String, &usize)> = self.selection.iter().collect();
        ids.sort_by_key(|(_, order)| **order);
        ids.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub(crate) fn toggle_selection(&mut self) {
        let Some(task) = self.selected_task() else { return };
        let id = task.id.clone();
        if self.selection.remove(&id).is_none() {
            self.selection.insert(id, self.next_selection_order);
            self.next_selection_order += 1;
        }
    }

    fn clamp_selection(&mut self) {
        let columns = self.columns();
        if columns.is_empty() {
            self.selected_column = 0;
            self.selected_card = 0;
            return;
        }
        self.selected_column = self.selected_column.min(columns.len() - 1);
        let count = self.column_tasks(&columns[self.selected_column]).len();
        self.selected_card = self.selected_card.min(count.saturating_sub(1));
    }

    // ── Command spawns ───────────────────────────────────────────────────

    pub fn refresh_board(&self) {
        if let Some(board) = &self.board {
            operations::spawn_board_refresh(self.graph.clone(), board.id.clone(), self.tx.clone());
        }
    }

    /// Switch the active board and refresh. The first board ever opened
    /// becomes the project default so the next start lands on it.
    pub fn open_board(&mut self, board: Board) {
        if self.config.default_board.is_none() {
            self.config.default_board = Some(board.prefix.clone());
            if let Err(e) = self.config.save(&self.project_root) {
                tracing::warn!(error = %e, "Failed to persist default board");
            }
        }
        self.board = Some(board);
        self.selection.clear();
        self.selected_column = 0;
        self.selected_card = 0;
        self.view = View::Board;
        self.refresh_board();
    }

    pub(crate) fn open_detail(&mut self) {
        let Some(task_id) = self.selected_task().map(|task| task.id.clone()) else { return };
        self.detail_generation += 1;
        self.view = View::TaskDetail;
        self.detail = None;
        operations::spawn_detail_load(
            self.graph.clone(),
            task_id,
            self.detail_generation,
            self.tx.clone(),
        );
    }

    pub(crate) fn close_detail(&mut self) {
        // Bumping the generation discards any load still in flight
        self.detail_generation += 1;
        self.detail = None;
        self.view = View::Board;
    }

    fn refresh_detail_if_open(&mut self) {
        if self.view == View::TaskDetail {
            if let Some(detail) = &self.detail {
                self.detail_generation += 1;
                operations::spawn_detail_load(
                    self.graph.clone(),
                    detail.task.id.clone(),
                    self.detail_generation,
                    self.tx.clone(),
                );
            }
        }
    }

    pub(crate) fn resume_mode(&self) -> ResumeMode {
        self.board
            .as_ref()
            .map(|b| b.resume_mode)
            .unwrap_or_default()
    }

    pub(crate) fn tx(&self) -> mpsc::Sender<Message> {
        self.tx.clone()
    }
}
