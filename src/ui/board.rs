//! Board column widgets
//!
//! One column per board column key, cards sorted by fractional position.
//! The pause column gets the attention color so a waiting agent is visible
//! at a glance.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::config::colors;
use crate::model::{Priority, Task, COLUMN_DONE, COLUMN_NEED_INPUT};

/// Rendered height of a task card in rows
const CARD_HEIGHT: u16 = 3;

pub fn render_board(f: &mut Frame, area: Rect, app: &App) {
    let columns = app.columns();
    if columns.is_empty() {
        let empty = Paragraph::new("No board selected. Press B to pick one.")
            .style(Style::default().fg(colors::DIM));
        f.render_widget(empty, area);
        return;
    }

    let constraints: Vec<Constraint> = columns
        .iter()
        .map(|_| Constraint::Ratio(1, columns.len() as u32))
        .collect();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (i, column) in columns.iter().enumerate() {
        let tasks = app.column_tasks(column);
        let selected_card = (app.selected_column == i).then_some(app.selected_card);
        render_column(f, chunks[i], app, column, &tasks, selected_card);
    }
}

fn column_color(column: &str) -> ratatui::style::Color {
    match column {
        COLUMN_NEED_INPUT => colors::NEED_INPUT,
        COLUMN_DONE => colors::DONE,
        "in_progress" => colors::IN_PROGRESS,
        _ => colors::DIM,
    }
}

fn render_column(
    f: &mut Frame,
    area: Rect,
    app: &App,
    column: &str,
    tasks: &[&Task],
    selected_card: Option<usize>,
) {
    let active = selected_card.is_some();
    let (header_style, border_style) = if active {
        (
            Style::default()
                .fg(colors::HIGHLIGHT)
                .add_modifier(Modifier::BOLD),
            Style::default().fg(colors::HIGHLIGHT),
        )
    } else {
        (
            Style::default().fg(column_color(column)),
            Style::default().fg(colors::BORDER),
        )
    };

    let block = Block::default()
        .title(format!(" {} ({}) ", column, tasks.len()))
        .title_style(header_style)
        .borders(Borders::ALL)
        .border_style(border_style)
        .border_type(BorderType::Rounded);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let prefix = app.board.as_ref().map(|b| b.prefix.as_str()).unwrap_or("");
    for (i, task) in tasks.iter().enumerate() {
        let y = inner.y + (i as u16 * CARD_HEIGHT);
        if y + CARD_HEIGHT > inner.y + inner.height {
            break;
        }
        let card_area = Rect::new(inner.x, y, inner.width, CARD_HEIGHT);
        let is_selected = selected_card == Some(i);
        let is_multi = app.selection.contains_key(&task.id);
        render_card(f, card_area, prefix, task, is_selected, is_multi);
    }

    // Overflow indicator when cards don't fit
    let visible = (inner.height / CARD_HEIGHT) as usize;
    if tasks.len() > visible && inner.height > 0 {
        let overflow = Paragraph::new(format!("... +{} more", tasks.len() - visible)).style(
            Style::default()
                .fg(colors::DIM)
                .add_modifier(Modifier::DIM),
        );
        let y = inner.y + inner.height.saturating_sub(1);
        f.render_widget(overflow, Rect::new(inner.x, y, inner.width, 1));
    }
}

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "!!",
        Priority::High => "!",
        Priority::Medium => "",
        Priority::Low => "·",
    }
}

fn render_card(
    f: &mut Frame,
    area: Rect,
    prefix: &str,
    task: &Task,
    is_selected: bool,
    is_multi: bool,
) {
    let border_style = if is_selected {
        Style::default().fg(colors::HIGHLIGHT)
    } else if task.is_paused() {
        Style::default().fg(colors::NEED_INPUT)
    } else {
        Style::default().fg(colors::BORDER)
    };

    let mark = if is_multi { "◉ " } else { "" };
    let marker = priority_marker(task.priority);
    let urgency_style = if task.priority == Priority::Urgent {
        Style::default().fg(colors::URGENT)
    } else {
        Style::default().fg(colors::DIM)
    };

    let mut title_line = format!("{mark}{} {}", task.display_id(prefix), task.title);
    if task.agent_session.is_some() {
        title_line.push_str(" ⚡");
    }

    let card = Paragraph::new(vec![Line::styled(
        title_line,
        Style::default().fg(colors::FG),
    )])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_bottom(Line::styled(marker, urgency_style)),
    );
    f.render_widget(card, area);
}
