//! UI rendering for the board TUI
//!
//! A kanban layout driven entirely by [`App`] state: header with board and
//! connection status, one column widget per board column, and a footer for
//! key hints and status messages. Overlays (detail, form, confirm dialog,
//! board selector) render on top of the board.

mod board;
mod confirm;
mod detail;
mod form;
mod helpers;
mod selector;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use crate::app::{App, View};
use crate::config::colors;

/// Main render function
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Board columns
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], app);
    board::render_board(f, chunks[1], app);
    render_footer(f, chunks[2], app);

    match app.view {
        View::Board => {}
        View::TaskDetail => detail::render_detail(f, app),
        View::TaskForm => form::render_form(f, app),
        View::ConfirmDialog => confirm::render_confirm(f, app),
        View::BoardSelector => selector::render_selector(f, app),
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let board_label = app
        .board
        .as_ref()
        .map_or_else(|| "no board".to_string(), |b| {
            format!("{} [{}]", b.name, b.prefix)
        });
    let paused = app
        .tasks
        .iter()
        .filter(|t| t.is_paused())
        .count();
    let title = if paused > 0 {
        format!(
            " EgenSkriven — {board_label} — {} tasks ({paused} need input) — {} ",
            app.tasks.len(),
            app.conn_state.label()
        )
    } else {
        format!(
            " EgenSkriven — {board_label} — {} tasks — {} ",
            app.tasks.len(),
            app.conn_state.label()
        )
    };

    let header = Paragraph::new(title)
        .style(Style::default().fg(colors::FG).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors::BORDER))
                .border_type(BorderType::Rounded),
        );
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let text = if let Some((message, _)) = &app.status_message {
        message.clone()
    } else {
        match app.view {
            View::Board => {
                " hjkl move  Enter detail  n new  space select  H/L shift  M bulk-move  x delete  u unblock  r resume  B boards  q quit"
                    .to_string()
            }
            View::TaskDetail => " Esc back  c comment  u unblock  r resume".to_string(),
            View::TaskForm => " Tab field  Enter create  Esc cancel".to_string(),
            View::ConfirmDialog => " y confirm  n cancel".to_string(),
            View::BoardSelector => " jk move  Enter open  Esc back".to_string(),
        }
    };
    let footer = Paragraph::new(text).style(Style::default().fg(colors::DIM));
    f.render_widget(footer, area);
}
