//! Task detail overlay
//!
//! Shows the task header, description, open question, conversation, and a
//! comment input line when editing. History stays in the store; the resume
//! prompt carries it to the agent instead.

use ratatui::{
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::config::colors;

use super::helpers::centered_rect;

pub fn render_detail(f: &mut Frame, app: &App) {
    let area = centered_rect(70, 80, f.area());
    f.render_widget(Clear, area);

    let Some(detail) = &app.detail else {
        let loading = Paragraph::new("loading…")
            .style(Style::default().fg(colors::DIM))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(colors::BORDER)),
            );
        f.render_widget(loading, area);
        return;
    };

    let task = &detail.task;
    let prefix = app.board.as_ref().map(|b| b.prefix.as_str()).unwrap_or("");

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::styled(
        format!("{} — {}", task.display_id(prefix), task.title),
        Style::default().fg(colors::FG).add_modifier(Modifier::BOLD),
    ));
    lines.push(Line::styled(
        format!(
            "{} · {} · {}",
            task.column,
            task.task_type.as_str(),
            task.priority.as_str()
        ),
        Style::default().fg(colors::DIM),
    ));
    if let Some(question) = &task.open_question {
        lines.push(Line::styled(
            format!("needs input: {question}"),
            Style::default().fg(colors::NEED_INPUT),
        ));
    }
    if let Some(session) = &task.agent_session {
        lines.push(Line::styled(
            format!(
                "session: {} {} in {}",
                session.tool.as_str(),
                session.external_ref,
                session.working_dir
            ),
            Style::default().fg(colors::IN_PROGRESS),
        ));
    }
    if !task.blocked_by.is_empty() {
        lines.push(Line::styled(
            format!("blocked by {} task(s)", task.blocked_by.len()),
            Style::default().fg(colors::URGENT),
        ));
    }
    lines.push(Line::raw(""));

    if !task.description.is_empty() {
        for text_line in task.description.lines() {
            lines.push(Line::raw(text_line.to_string()));
        }
        lines.push(Line::raw(""));
    }

    lines.push(Line::styled(
        "Conversation",
        Style::default().fg(colors::DIM).add_modifier(Modifier::BOLD),
    ));
    if detail.comments.is_empty() {
        lines.push(Line::styled("(no comments)", Style::default().fg(colors::DIM)));
    }
    for comment in &detail.comments {
        lines.push(Line::raw(format!(
            "[{}] {}",
            comment.author_type.as_str(),
            comment.content
        )));
    }

    if detail.editing_comment {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!("> {}▏", detail.comment_input),
            Style::default().fg(colors::HIGHLIGHT),
        ));
    }

    let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(" Task ")
            .title_bottom(" [Esc] Close  [c] Comment  [u] Unblock  [r] Resume ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(colors::HIGHLIGHT))
            .style(Style::default().bg(colors::BG)),
    );
    f.render_widget(widget, area);
}
