//! Board selector overlay

use ratatui::{
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::config::colors;

use super::helpers::centered_rect;

pub fn render_selector(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 50, f.area());
    f.render_widget(Clear, area);

    let lines: Vec<Line> = if app.boards.is_empty() {
        vec![Line::styled(
            "No boards yet. Create one: egenskriven board create <name> <prefix>",
            Style::default().fg(colors::DIM),
        )]
    } else {
        app.boards
            .iter()
            .enumerate()
            .map(|(i, board)| {
                let marker = if i == app.selector_index { "▸ " } else { "  " };
                let style = if i == app.selector_index {
                    Style::default()
                        .fg(colors::HIGHLIGHT)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(colors::FG)
                };
                Line::styled(
                    format!("{marker}{} [{}] · {}", board.name, board.prefix, board.resume_mode.as_str()),
                    style,
                )
            })
            .collect()
    };

    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(" Boards ")
            .title_bottom(" [Enter] Open  [Esc] Back ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(colors::HIGHLIGHT))
            .style(Style::default().bg(colors::BG)),
    );
    f.render_widget(widget, area);
}
