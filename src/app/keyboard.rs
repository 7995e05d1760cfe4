//! Keyboard input handling, routed per view
//!
//! Each view owns its key handler; keys destined for a different view never
//! reach it, so a background refresh can't race a form draft.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::{operations, App, ConfirmAction, ConfirmState, FormState, View};

impl App {
    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        // Ctrl+C quits from anywhere
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.view {
            View::Board => self.handle_key_board(key),
            View::TaskDetail => self.handle_key_detail(key),
            View::TaskForm => self.handle_key_form(key),
            View::ConfirmDialog => self.handle_key_confirm(key),
            View::BoardSelector => self.handle_key_selector(key),
        }
    }

    fn handle_key_board(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,

            // Column navigation (horizontal)
            KeyCode::Char('h') | KeyCode::Left => {
                self.selected_column = self.selected_column.saturating_sub(1);
                self.selected_card = 0;
            }
            KeyCode::Char('l') | KeyCode::Right => {
                let max = self.columns().len().saturating_sub(1);
                self.selected_column = (self.selected_column + 1).min(max);
                self.selected_card = 0;
            }
            // Card navigation (vertical within column)
            KeyCode::Char('j') | KeyCode::Down => {
                let columns = self.columns();
                if let Some(column) = columns.get(self.selected_column) {
                    let count = self.column_tasks(column).len();
                    self.selected_card = (self.selected_card + 1).min(count.saturating_sub(1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_card = self.selected_card.saturating_sub(1);
            }

            KeyCode::Enter => self.open_detail(),

            // New task form
            KeyCode::Char('n') => {
                if self.board.is_some() {
                    self.form = FormState::default();
                    self.view = View::TaskForm;
                }
            }

            // Board selector
            KeyCode::Char('B') => {
                operations::spawn_boards_load(self.graph.clone(), self.tx());
                self.selector_index = 0;
                self.view = View::BoardSelector;
            }

            // Move the selected task one column left/right
            KeyCode::Char('H') => self.move_selected_by(-1),
            KeyCode::Char('L') => self.move_selected_by(1),

            // Selection and bulk operations
            KeyCode::Char(' ') => self.toggle_selection(),
            KeyCode::Char('M') => {
                let ids = self.selection_in_order();
                let columns = self.columns();
                let Some(column) = columns.get(self.selected_column) else { return };
                if ids.is_empty() {
                    self.show_status("nothing selected");
                    return;
                }
                operations::spawn_bulk_move(
                    self.graph.clone(),
                    ids,
                    column.clone(),
                    self.tx(),
                );
                self.selection.clear();
            }
            KeyCode::Char('x') => {
                let bulk = self.selection_in_order();
                if !bulk.is_empty() {
                    self.confirm = Some(ConfirmState {
                        message: format!("Delete {} selected tasks?", bulk.len()),
                        action: ConfirmAction::BulkDelete(bulk),
                    });
                    self.view = View::ConfirmDialog;
                } else if let Some(task) = self.selected_task() {
                    self.confirm = Some(ConfirmState {
                        message: format!("Delete \"{}\"?", task.title),
                        action: ConfirmAction::DeleteTask(task.id.clone()),
                    });
                    self.view = View::ConfirmDialog;
                }
            }

            // Pause/resume affordances
            KeyCode::Char('u') => {
                if let Some(task) = self.selected_task() {
                    operations::spawn_unblock(self.graph.clone(), task.id.clone(), self.tx());
                }
            }
            KeyCode::Char('r') => self.resume_selected(),

            _ => {}
        }
    }

    fn handle_key_detail(&mut self, key: KeyEvent) {
        let editing = self
            .detail
            .as_ref()
            .is_some_and(|d| d.editing_comment);

        if editing {
            let Some(detail) = self.detail.as_mut() else { return };
            match key.code {
                KeyCode::Esc => {
                    detail.editing_comment = false;
                    detail.comment_input.clear();
                }
                KeyCode::Enter => {
                    let content = detail.comment_input.trim().to_string();
                    detail.editing_comment = false;
                    detail.comment_input.clear();
                    if !content.is_empty() {
                        let task_id = detail.task.id.clone();
                        operations::spawn_comment(self.graph.clone(), task_id, content, self.tx());
                    }
                }
                KeyCode::Backspace => {
                    detail.comment_input.pop();
                }
                KeyCode::Char(c) => detail.comment_input.push(c),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.close_detail(),
            KeyCode::Char('c') => {
                if let Some(detail) = self.detail.as_mut() {
                    detail.editing_comment = true;
                }
            }
            KeyCode::Char('u') => {
                if let Some(detail) = &self.detail {
                    operations::spawn_unblock(
                        self.graph.clone(),
                        detail.task.id.clone(),
                        self.tx(),
                    );
                }
            }
            KeyCode::Char('r') => {
                if let Some(detail) = &self.detail {
                    if detail.task.agent_session.is_none() {
                        self.show_status("task has no linked agent session");
                        return;
                    }
                    let execute = !matches!(self.resume_mode(), crate::model::ResumeMode::Manual);
                    operations::spawn_build_resume(
                        self.graph.clone(),
                        detail.task.id.clone(),
                        execute,
                        self.tx(),
                    );
                }
            }
            _ => {}
        }
    }

    fn handle_key_form(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                // Discarding the draft; an in-flight submit would report
                // into the status line, never into a reopened form
                self.form = FormState::default();
                self.view = View::Board;
            }
            KeyCode::Tab => {
                self.form.editing_description = !self.form.editing_description;
            }
            KeyCode::Enter => {
                let title = self.form.title.trim().to_string();
                if title.is_empty() {
                    self.show_status("title must not be empty");
                    return;
                }
                let Some(board) = &self.board else { return };
                operations::spawn_task_create(
                    self.graph.clone(),
                    board.id.clone(),
                    title,
                    self.form.description.clone(),
                    self.tx(),
                );
                self.form = FormState::default();
                self.view = View::Board;
            }
            KeyCode::Backspace => {
                if self.form.editing_description {
                    self.form.description.pop();
                } else {
                    self.form.title.pop();
                }
            }
            KeyCode::Char(c) => {
                if self.form.editing_description {
                    self.form.description.push(c);
                } else {
                    self.form.title.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_key_confirm(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(confirm) = self.confirm.take() {
                    match confirm.action {
                        ConfirmAction::DeleteTask(task_id) => {
                            operations::spawn_task_delete(self.graph.clone(), task_id, self.tx());
                        }
                        ConfirmAction::BulkDelete(task_ids) => {
                            operations::spawn_bulk_delete(
                                self.graph.clone(),
                                task_ids,
                                self.tx(),
                            );
                            self.selection.clear();
                        }
                    }
                }
                self.view = View::Board;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.confirm = None;
                self.view = View::Board;
            }
            _ => {}
        }
    }

    fn handle_key_selector(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.view = View::Board,
            KeyCode::Char('j') | KeyCode::Down => {
                let max = self.boards.len().saturating_sub(1);
                self.selector_index = (self.selector_index + 1).min(max);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selector_index = self.selector_index.saturating_sub(1);
            }
            KeyCode::Enter => {
                if let Some(board) = self.boards.get(self.selector_index).cloned() {
                    self.open_board(board);
                }
            }
            _ => {}
        }
    }

    /// Move the highlighted task to the neighbouring column
    fn move_selected_by(&mut self, delta: isize) {
        let columns = self.columns();
        let Some(task) = self.selected_task() else { return };
        let Some(current) = columns.iter().position(|c| *c == task.column) else {
            return;
        };
        let target = current as isize + delta;
        if target < 0 || target as usize >= columns.len() {
            return;
        }
        let column = columns[target as usize].clone();
        operations::spawn_task_move(self.graph.clone(), task.id.clone(), column, self.tx());
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use crossterm::event::{KeyCode, KeyEvent};
    use tokio::sync::mpsc;

    use super::super::{App, Message, View};
    use crate::config::EgenConfig;
    use crate::graph::{NewTask, TaskGraph};
    use crate::store::{HttpStore, LocalStore};

    async fn test_app() -> (App, mpsc::Receiver<Message>) {
        let store = Arc::new(LocalStore::in_memory());
        let graph = Arc::new(TaskGraph::new(store, "tui"));
        let board = graph.create_board("Work", "WRK").await.unwrap();
        for title in ["one", "two", "three"] {
            graph
                .create_task(NewTask {
                    board: board.id.clone(),
                    title: title.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let (tx, rx) = mpsc::channel(16);
        let mut app = App::new(
            graph.clone(),
            HttpStore::new("http://192.0.2.1:9"),
            EgenConfig::default(),
            PathBuf::from("."),
            tx,
        );
        app.tasks = graph.board_tasks(&board.id).await.unwrap();
        app.board = Some(board);
        (app, rx)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::from(code));
    }

    #[tokio::test]
    async fn test_navigation_stays_in_bounds() {
        let (mut app, _rx) = test_app().await;
        for _ in 0..10 {
            press(&mut app, KeyCode::Char('l'));
        }
        assert_eq!(app.selected_column, app.columns().len() - 1);
        for _ in 0..10 {
            press(&mut app, KeyCode::Char('h'));
        }
        assert_eq!(app.selected_column, 0);

        for _ in 0..10 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.selected_card, 2);
    }

    /// Keys for the board view must not leak into the form draft
    #[tokio::test]
    async fn test_form_captures_text_keys() {
        let (mut app, _rx) = test_app().await;
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.view, View::TaskForm);

        // 'q' would quit on the board view; here it is draft text
        for c in "quick fix".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert!(!app.should_quit);
        assert_eq!(app.form.title, "quick fix");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view, View::Board);
        assert!(app.form.title.is_empty());
    }

    #[tokio::test]
    async fn test_selection_preserves_order() {
        let (mut app, _rx) = test_app().await;
        // Select card 1, then card 0
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Char(' '));

        let order = app.selection_in_order();
        assert_eq!(order.len(), 2);
        let backlog = app.column_tasks("backlog");
        assert_eq!(order[0], backlog[1].id);
        assert_eq!(order[1], backlog[0].id);
    }

    #[tokio::test]
    async fn test_delete_asks_for_confirmation() {
        let (mut app, mut rx) = test_app().await;
        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.view, View::ConfirmDialog);

        // 'n' cancels without issuing the delete
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.view, View::Board);
        assert!(app.confirm.is_none());
        assert!(rx.try_recv().is_err());
    }
}
