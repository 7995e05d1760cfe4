//! EgenSkriven - local-first kanban task tracker with agent pause/resume
//!
//! A single binary with two modes:
//! - TUI mode (default): interactive board with live sync against the
//!   shared record store, falling back to polling when the host is away
//! - CLI mode: headless subcommands for scripts and coding agents
//!   (`egenskriven add`, `block`, `resume`, `session link`, ...)

mod app;
mod cli;
mod commands;
mod config;
mod errors;
mod graph;
mod input;
mod model;
mod position;
mod resume;
mod seq;
mod store;
mod sync;
mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use app::{App, Message};
use clap::Parser;
use cli::{Cli, Commands};
use color_eyre::Result;
use config::EgenConfig;
use graph::TaskGraph;
use store::{HttpStore, HybridStore, LocalStore};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log directory under the platform cache dir
fn log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("/tmp/egenskriven/logs"),
        |dirs| dirs.cache_dir().join("egenskriven").join("logs"),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli
        .root
        .clone()
        .map_or_else(std::env::current_dir, Ok)?;

    // Headless subcommands print to stdout and exit
    if let Some(command) = cli.command {
        if matches!(command, Commands::Completions { .. }) {
            if let Commands::Completions { shell } = command {
                cli::print_completions(shell);
            }
            return Ok(());
        }
        let ctx = commands::CliContext::new(&cli.api, root, cli.board)?;
        return commands::run(ctx, command)
            .await
            .map_err(|e| color_eyre::eyre::eyre!("{e}"));
    }

    // TUI mode from here on
    color_eyre::install()?;

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "egenskriven.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // File-only logging: stdout/stderr belong to the terminal UI
    let log_filter = format!("egenskriven={}", cli.log_level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(non_blocking),
        )
        .init();

    tracing::info!("Starting egenskriven v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(api = %cli.api, root = %root.display(), "Configuration");

    let config = EgenConfig::load(&root);
    let api = HttpStore::new(&cli.api);
    let direct = Arc::new(LocalStore::open(&EgenConfig::data_dir(&root))?);
    let hybrid = Arc::new(HybridStore::new(api.clone(), direct));
    let graph = Arc::new(TaskGraph::new(hybrid, "tui"));

    let (tx, rx) = mpsc::channel::<Message>(100);
    let mut app = App::new(graph.clone(), api, config.clone(), root, tx.clone());

    // Resolve the starting board: --board flag, config default, lone board
    let start_prefix = cli.board.or(config.default_board);
    let starting_board = match start_prefix {
        Some(prefix) => graph.find_board_by_prefix(&prefix).await.ok(),
        None => graph
            .list_boards()
            .await
            .ok()
            .and_then(|boards| (boards.len() == 1).then(|| boards.into_iter().next()).flatten()),
    };
    match starting_board {
        Some(board) => app.open_board(board),
        None => {
            app::operations::spawn_boards_load(graph.clone(), tx.clone());
            app.view = app::View::BoardSelector;
        }
    }
    app.start_stream();

    let result = run_tui(app, tx, rx).await;
    tracing::info!("Shutting down");
    result
}

async fn run_tui(
    mut app: App,
    tx: mpsc::Sender<Message>,
    mut rx: mpsc::Receiver<Message>,
) -> Result<()> {
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    let tick_duration = Duration::from_secs(1);
    let frame_duration = Duration::from_millis(33); // ~30 FPS cap

    let mut terminal = tui::init()?;
    let _guard = tui::TerminalGuard;

    // Input listener with graceful shutdown
    let cancel = CancellationToken::new();
    let input_cancel = cancel.clone();
    let input_handle = tokio::spawn(async move {
        input::listen(tx, input_cancel).await;
    });

    let mut last_frame = Instant::now();
    loop {
        // Render-on-change with a frame-rate cap
        let now = Instant::now();
        if app.needs_render && now.duration_since(last_frame) >= frame_duration {
            terminal.draw(|f| ui::render(f, &app))?;
            app.needs_render = false;
            last_frame = now;
        }

        // One message per turn keeps the loop responsive under event bursts
        tokio::select! {
            Some(message) = rx.recv() => {
                app.handle_message(message);
            }
            () = tokio::time::sleep(tick_duration) => {
                app.handle_message(Message::Tick);
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.shutdown();
    cancel.cancel();
    input_handle.abort();

    tui::restore()?;
    terminal.show_cursor()?;
    Ok(())
}
