//! CLI command handlers
//!
//! Each handler resolves its inputs, invokes the same task-graph operations
//! the TUI uses, and prints plain text to stdout. The write path is the
//! hybrid store, so a running store host is used when reachable and the
//! local JSON store otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use crate::app::operations::{build_resume_for_task, execute_resume};
use crate::cli::{BoardAction, Commands, SessionAction};
use crate::config::EgenConfig;
use crate::errors::{CoreError, Result};
use crate::graph::{NewTask, Placement, TaskGraph, TaskPatch};
use crate::model::{
    AuthorType, Board, CreatedBy, Priority, ResumeMode, TaskType, COLUMN_NEED_INPUT,
};
use crate::store::{HttpStore, HybridStore, LocalStore};

pub struct CliContext {
    pub graph: Arc<TaskGraph>,
    pub config: EgenConfig,
    pub root: PathBuf,
    board_override: Option<String>,
}

impl CliContext {
    pub fn new(api_url: &str, root: PathBuf, board_override: Option<String>) -> Result<Self> {
        let config = EgenConfig::load(&root);
        let direct = Arc::new(LocalStore::open(&EgenConfig::data_dir(&root))?);
        let hybrid = HybridStore::new(HttpStore::new(api_url), direct);
        let graph = Arc::new(TaskGraph::new(Arc::new(hybrid), "cli"));
        Ok(Self {
            graph,
            config,
            root,
            board_override,
        })
    }

    /// Resolve the board to operate on: `--board` flag, then the config's
    /// `default_board`, then a lone existing board.
    async fn active_board(&self) -> Result<Board> {
        if let Some(prefix) = &self.board_override {
            return self.graph.find_board_by_prefix(prefix).await;
        }
        if let Some(prefix) = &self.config.default_board {
            return self.graph.find_board_by_prefix(prefix).await;
        }
        let mut boards = self.graph.list_boards().await?;
        if boards.len() > 1 {
            return Err(CoreError::validation(
                "several boards exist; pick one with --board or `egenskriven board use <prefix>`",
            ));
        }
        boards.pop().ok_or_else(|| {
            CoreError::validation(
                "no boards exist; create one with `egenskriven board create <name> <prefix>`",
            )
        })
    }
}

fn parse_task_type(s: &str) -> Result<TaskType> {
    TaskType::parse(s)
        .ok_or_else(|| CoreError::validation(format!("unknown type {s:?}; use bug, feature, chore")))
}

fn parse_priority(s: &str) -> Result<Priority> {
    Priority::parse(s).ok_or_else(|| {
        CoreError::validation(format!("unknown priority {s:?}; use low, medium, high, urgent"))
    })
}

pub async fn run(ctx: CliContext, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            title,
            description,
            task_type,
            priority,
            column,
            label,
            due,
        } => {
            let board = ctx.active_board().await?;
            let task = ctx
                .graph
                .create_task(NewTask {
                    board: board.id.clone(),
                    title,
                    description,
                    task_type: task_type.as_deref().map(parse_task_type).transpose()?,
                    priority: priority.as_deref().map(parse_priority).transpose()?,
                    column,
                    labels: label,
                    due_date: due,
                    created_by: CreatedBy::Cli,
                    ..Default::default()
                })
                .await?;
            println!("{} {}", task.display_id(&board.prefix), task.title);
        }

        Commands::Update {
            task,
            title,
            description,
            task_type,
            priority,
            column,
        } => {
            let target = ctx.graph.resolve_task(&task).await?;
            let updated = ctx
                .graph
                .update_task(
                    &target.id,
                    TaskPatch {
                        title,
                        description,
                        task_type: task_type.as_deref().map(parse_task_type).transpose()?,
                        priority: priority.as_deref().map(parse_priority).transpose()?,
                        column,
                        ..Default::default()
                    },
                )
                .await?;
            println!("updated {}", updated.title);
        }

        Commands::Move { task, column, at } => {
            let target = ctx.graph.resolve_task(&task).await?;
            let place = at.map_or(Placement::End, Placement::Index);
            let moved = ctx.graph.move_task(&target.id, &column, place).await?;
            println!("{} -> {}", moved.title, moved.column);
        }

        Commands::Delete { task, yes } => {
            let target = ctx.graph.resolve_task(&task).await?;
            if !yes && !confirm(&format!("Delete \"{}\"?", target.title))? {
                println!("cancelled");
                return Ok(());
            }
            ctx.graph.delete_task(&target.id).await?;
            println!("deleted {}", target.title);
        }

        Commands::Block { task, reason } => {
            let target = ctx.graph.resolve_task(&task).await?;
            let blocked = ctx.graph.block(&target.id, &reason).await?;
            println!("{} is waiting for input: {reason}", blocked.title);
        }

        Commands::Unblock { task } => {
            let target = ctx.graph.resolve_task(&task).await?;
            let resumed = ctx.graph.unblock(&target.id).await?;
            println!("{} -> {}", resumed.title, resumed.column);
        }

        Commands::Comment {
            task,
            content,
            agent,
        } => {
            let target = ctx.graph.resolve_task(&task).await?;
            let author = if agent {
                AuthorType::Agent
            } else {
                AuthorType::Human
            };
            ctx.graph.add_comment(&target.id, &content, author).await?;
            println!("commented on {}", target.title);
        }

        Commands::Resume { task, exec } => {
            let target = ctx.graph.resolve_task(&task).await?;
            let command = build_resume_for_task(&ctx.graph, &target.id).await?;
            if exec {
                execute_resume(&command)
                    .map_err(|e| CoreError::transient(format!("exec failed: {e}")))?;
                println!(
                    "resumed {} session {} in {}",
                    command.tool.as_str(),
                    command.session_ref,
                    command.working_dir
                );
            } else {
                println!("{}", command.shell_line);
            }
        }

        Commands::Session { action } => match action {
            SessionAction::Link {
                task,
                tool,
                external_ref,
                dir,
            } => {
                let target = ctx.graph.resolve_task(&task).await?;
                let linked = ctx
                    .graph
                    .link_session(&target.id, &tool, &external_ref, &dir)
                    .await?;
                println!("linked {tool} session to {}", linked.title);
            }
            SessionAction::Unlink { task } => {
                let target = ctx.graph.resolve_task(&task).await?;
                ctx.graph.unlink_session(&target.id).await?;
                println!("unlinked session from {}", target.title);
            }
            SessionAction::Show { task } => {
                let target = ctx.graph.resolve_task(&task).await?;
                match &target.agent_session {
                    Some(session) => println!(
                        "{} {} ({:?}) in {}",
                        session.tool.as_str(),
                        session.external_ref,
                        session.ref_type,
                        session.working_dir
                    ),
                    None => println!("no session linked"),
                }
                for record in ctx.graph.task_sessions(&target.id).await? {
                    println!(
                        "  {} {} [{}]",
                        record.tool.as_str(),
                        record.external_ref,
                        record.status.as_str()
                    );
                }
            }
        },

        Commands::List { need_input, column } => {
            let board = ctx.active_board().await?;
            let tasks = ctx.graph.board_tasks(&board.id).await?;
            for task in tasks {
                if need_input && task.column != COLUMN_NEED_INPUT {
                    continue;
                }
                if let Some(column) = &column {
                    if task.column != *column {
                        continue;
                    }
                }
                let question = task
                    .open_question
                    .as_deref()
                    .map(|q| format!("  ? {q}"))
                    .unwrap_or_default();
                println!(
                    "{:<10} {:<12} {}{question}",
                    task.display_id(&board.prefix),
                    task.column,
                    task.title
                );
            }
        }

        Commands::Board { action } => match action {
            BoardAction::Create { name, prefix } => {
                let board = ctx.graph.create_board(&name, &prefix).await?;
                println!("created board {} [{}]", board.name, board.prefix);
            }
            BoardAction::List => {
                let default = ctx.config.default_board.clone().unwrap_or_default();
                for board in ctx.graph.list_boards().await? {
                    let marker = if board.prefix == default { "*" } else { " " };
                    println!(
                        "{marker} {} [{}] resume={} next_seq={}",
                        board.name,
                        board.prefix,
                        board.resume_mode.as_str(),
                        board.next_seq
                    );
                }
            }
            BoardAction::Use { prefix } => {
                let board = ctx.graph.find_board_by_prefix(&prefix).await?;
                let mut config = ctx.config.clone();
                config.default_board = Some(board.prefix.clone());
                config.save(&ctx.root)?;
                println!("default board is now {} [{}]", board.name, board.prefix);
            }
            BoardAction::Update {
                prefix,
                name,
                resume_mode,
                color,
                delete,
                cascade,
            } => {
                let mut board = ctx.graph.find_board_by_prefix(&prefix).await?;
                if delete {
                    if !confirm(&format!(
                        "Delete board {} [{}]{}?",
                        board.name,
                        board.prefix,
                        if cascade { " and all its tasks" } else { "" }
                    ))? {
                        println!("cancelled");
                        return Ok(());
                    }
                    ctx.graph.delete_board(&board.id, cascade).await?;
                    println!("deleted board {}", board.name);
                    return Ok(());
                }
                if let Some(name) = name {
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        return Err(CoreError::validation("board name must not be empty"));
                    }
                    board.name = name;
                }
                if let Some(mode) = resume_mode {
                    board.resume_mode = ResumeMode::parse(&mode).ok_or_else(|| {
                        CoreError::validation(format!(
                            "unknown resume mode {mode:?}; use manual, command, auto"
                        ))
                    })?;
                }
                if let Some(color) = color {
                    board.color = Some(color);
                }
                let board = ctx.graph.update_board(&board).await?;
                println!(
                    "updated board {} [{}] resume={}",
                    board.name,
                    board.prefix,
                    board.resume_mode.as_str()
                );
            }
        },

        Commands::Completions { shell } => {
            crate::cli::print_completions(shell);
        }
    }
    Ok(())
}

/// Prompt on stdin for a y/N answer
fn confirm(question: &str) -> Result<bool> {
    use std::io::Write;
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
