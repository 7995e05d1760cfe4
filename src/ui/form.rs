//! New-task form modal

use ratatui::{
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::config::colors;

use super::helpers::centered_rect;

pub fn render_form(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);

    let cursor = "▏";
    let (title_cursor, desc_cursor) = if app.form.editing_description {
        ("", cursor)
    } else {
        (cursor, "")
    };

    let field_style = |active: bool| {
        if active {
            Style::default().fg(colors::FG).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors::DIM)
        }
    };

    let lines = vec![
        Line::styled(
            format!("Title: {}{title_cursor}", app.form.title),
            field_style(!app.form.editing_description),
        ),
        Line::raw(""),
        Line::styled(
            format!("Description: {}{desc_cursor}", app.form.description),
            field_style(app.form.editing_description),
        ),
    ];

    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(" New Task ")
            .title_bottom(" [Enter] Create  [Tab] Field  [Esc] Cancel ")
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Style::default().fg(colors::HIGHLIGHT))
            .style(Style::default().bg(colors::BG)),
    );
    f.render_widget(widget, area);
}
