//! Resume affordance policy
//!
//! How a ready resume command is surfaced depends on the board's
//! `resume_mode`: `manual` renders the shell line for the user to copy,
//! `command` and `auto` execute the argv. Auto mode additionally watches
//! the comment feed: a human comment mentioning `@agent` on a task with a
//! bound session resumes it without prompting.

use crate::model::{Comment, ResumeMode};
use crate::resume::ResumeCommand;
use crate::sync::SyncEvent;

use super::{operations, App, Message};

impl App {
    /// The explicit resume affordance (the `r` key)
    pub(crate) fn resume_selected(&mut self) {
        let selected = self
            .selected_task()
            .map(|t| (t.id.clone(), t.agent_session.is_some()));
        let Some((task_id, has_session)) = selected else {
            self.show_status("no task selected");
            return;
        };
        if !has_session {
            self.show_status("task has no linked agent session");
            return;
        }
        let execute = match self.resume_mode() {
            // Manual: build and render, the user runs it themselves
            ResumeMode::Manual => false,
            // Command/auto: the affordance runs the argv directly
            ResumeMode::Command | ResumeMode::Auto => true,
        };
        operations::spawn_build_resume(self.graph.clone(), task_id, execute, self.tx());
    }

    /// A built command arrived from the builder task
    pub(crate) fn handle_resume_built(&mut self, command: ResumeCommand, execute: bool) {
        if !execute {
            self.show_status(&format!("resume: {}", command.shell_line));
            return;
        }
        match operations::execute_resume(&command) {
            Ok(()) => {
                tracing::info!(
                    tool = command.tool.as_str(),
                    session = %command.session_ref,
                    cwd = %command.working_dir,
                    "Resumed agent session"
                );
                self.show_status(&format!(
                    "resumed {} session {}",
                    command.tool.as_str(),
                    command.session_ref
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, tool = command.tool.as_str(), "Resume exec failed");
                self.show_status(&format!("resume exec failed: {e}"));
            }
        }
    }

    /// Ingest a comment event from the live stream. Under `resume_mode =
    /// auto`, a resume trigger on a session-bound task runs the command
    /// without prompting; a trigger on a task without a session only warns.
    pub(crate) fn handle_comment_event(&mut self, event: &SyncEvent) {
        if self.resume_mode() != ResumeMode::Auto {
            return;
        }
        let Ok(comment) = serde_json::from_value::<Comment>(event.record.clone()) else {
            return;
        };
        if !comment.is_resume_trigger() {
            return;
        }
        let Some(task) = self.tasks.iter().find(|t| t.id == comment.task) else {
            return;
        };
        if task.agent_session.is_none() {
            tracing::warn!(task = %task.id, "Resume trigger on task without agent session");
            self.show_status(&format!(
                "@agent mention on {} but no session is linked",
                task.title
            ));
            return;
        }
        tracing::info!(task = %task.id, "Auto-resume trigger");
        operations::spawn_build_resume(self.graph.clone(), task.id.clone(), true, self.tx());
    }
}
