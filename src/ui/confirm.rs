//! Confirmation dialog modal

use ratatui::{
    layout::Alignment,
    style::Style,
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::config::colors;

use super::helpers::centered_rect;

pub fn render_confirm(f: &mut Frame, app: &App) {
    let Some(confirm) = &app.confirm else { return };
    let area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, area);

    let widget = Paragraph::new(confirm.message.clone())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(colors::FG))
        .block(
            Block::default()
                .title(" Confirm ")
                .title_bottom(" [y] Yes  [n] No ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(colors::URGENT))
                .style(Style::default().bg(colors::BG)),
        );
    f.render_widget(widget, area);
}
