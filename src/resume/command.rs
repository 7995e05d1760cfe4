//! Resume command construction
//!
//! Each supported tool has a fixed argument-vector shape for resuming an
//! existing session with a new prompt. The argv is what a launcher execs;
//! the shell line is a safely quoted single-line rendering for humans to
//! copy, guaranteed to re-parse under a POSIX shell into the same argv.

use serde::Serialize;

use crate::errors::Result;
use crate::model::{validate_ref, AgentTool};

/// A fully assembled resume invocation
#[derive(Debug, Clone, Serialize)]
pub struct ResumeCommand {
    pub tool: AgentTool,
    pub session_ref: String,
    pub working_dir: String,
    pub prompt: String,
    pub argv: Vec<String>,
    pub shell_line: String,
}

/// Build the resume command for a session and prompt.
/// Refs shorter than 8 characters fail validation; unknown tools are
/// rejected upstream by [`AgentTool::parse`].
pub fn build_resume(
    tool: AgentTool,
    external_ref: &str,
    working_dir: &str,
    prompt: &str,
) -> Result<ResumeCommand> {
    validate_ref(external_ref)?;

    let argv: Vec<String> = match tool {
        AgentTool::OpenCode => vec![
            "opencode".into(),
            "run".into(),
            prompt.into(),
            "--session".into(),
            external_ref.into(),
        ],
        AgentTool::ClaudeCode => vec![
            "claude".into(),
            "--resume".into(),
            external_ref.into(),
            prompt.into(),
        ],
        AgentTool::Codex => vec![
            "codex".into(),
            "exec".into(),
            "resume".into(),
            external_ref.into(),
            prompt.into(),
        ],
    };

    let shell_line = argv
        .iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ResumeCommand {
        tool,
        session_ref: external_ref.to_string(),
        working_dir: working_dir.to_string(),
        prompt: prompt.to_string(),
        argv,
        shell_line,
    })
}

/// Single-quote a string for POSIX sh.
///
/// Everything between single quotes is literal, so only embedded single
/// quotes need care: each becomes `'\''` (close quote, escaped quote,
/// reopen). The empty string renders as `''`.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreError;

    /// Minimal POSIX sh word splitter covering the quoting forms the
    /// renderer emits: single quotes and bare backslash escapes.
    fn sh_split(line: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut started = false;
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '\'' {
                    in_quotes = false;
                } else {
                    current.push(c);
                }
            } else {
                match c {
                    '\'' => {
                        in_quotes = true;
                        started = true;
                    }
                    '\\' => {
                        if let Some(next) = chars.next() {
                            current.push(next);
                            started = true;
                        }
                    }
                    ' ' | '\t' => {
                        if started {
                            words.push(std::mem::take(&mut current));
                            started = false;
                        }
                    }
                    other => {
                        current.push(other);
                        started = true;
                    }
                }
            }
        }
        if started {
            words.push(current);
        }
        words
    }

    /// P5: argv matches the table bit-exactly per tool
    #[test]
    fn test_argv_table() {
        let prompt = "continue the work";
        let cmd = build_resume(AgentTool::OpenCode, "ref12345", "/proj", prompt).unwrap();
        assert_eq!(
            cmd.argv,
            vec!["opencode", "run", prompt, "--session", "ref12345"]
        );

        let cmd = build_resume(AgentTool::ClaudeCode, "ref12345", "/proj", prompt).unwrap();
        assert_eq!(cmd.argv, vec!["claude", "--resume", "ref12345", prompt]);

        let cmd = build_resume(AgentTool::Codex, "ref12345", "/proj", prompt).unwrap();
        assert_eq!(
            cmd.argv,
            vec!["codex", "exec", "resume", "ref12345", prompt]
        );
    }

    #[test]
    fn test_short_ref_rejected() {
        assert!(matches!(
            build_resume(AgentTool::ClaudeCode, "short", "/proj", "p"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            build_resume(AgentTool::ClaudeCode, "", "/proj", "p"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_quote_basics() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("don't"), "'don'\\''t'");
    }

    /// P6: the shell line re-parses into the exact argv for hostile prompts
    #[test]
    fn test_shell_round_trip() {
        let hostile_prompts = [
            "plain prompt",
            "it's got 'single quotes'",
            "double \"quotes\" inside",
            "line one\nline two",
            "vars $HOME and `backticks`",
            "history bang! and $(subshell)",
            "'; rm -rf / #",
            "",
            "unicode — ümlaut ✓",
        ];
        for prompt in hostile_prompts {
            let cmd = build_resume(AgentTool::ClaudeCode, "ref12345", "/proj", prompt).unwrap();
            let reparsed = sh_split(&cmd.shell_line);
            assert_eq!(reparsed, cmd.argv, "round trip failed for {prompt:?}");
        }
    }

    #[test]
    fn test_shell_line_preserves_specials_verbatim() {
        let cmd =
            build_resume(AgentTool::OpenCode, "ref12345", "/proj", "$HOME `id` !").unwrap();
        // Inside single quotes nothing is expanded, so the specials appear as-is
        assert!(cmd.shell_line.contains("'$HOME `id` !'"));
    }
}
