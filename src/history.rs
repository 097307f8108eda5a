/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/history.rs
 * Responsibility: Shell detection and recent history capture
 */

use crate::tail::{self, TailError};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

const HISTORY_NOT_FOUND: &str = "History file not found or HISTFILE not set.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalState {
    pub shell: String,
    pub history: Vec<String>,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shell: {}", self.shell)?;
        writeln!(f, "Last {} lines of history:", self.history.len())?;
        for line in &self.history {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Locate the history file.
/// Priority: HISTFILE > ~/.zsh_history for zsh > ~/.bash_history for bash
pub fn resolve_history_file(shell: &str, histfile: Option<&str>, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = histfile.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let home = home?;
    if shell.contains("zsh") {
        Some(home.join(".zsh_history"))
    } else if shell.contains("bash") {
        Some(home.join(".bash_history"))
    } else {
        None
    }
}

/// Capture shell and history from the current process environment.
pub fn capture_terminal_state(lines: usize) -> TerminalState {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "unknown".to_string());
    let histfile = std::env::var("HISTFILE").ok();
    let home = dirs::home_dir();
    let hist_path = resolve_history_file(&shell, histfile.as_deref(), home.as_deref());
    capture_from(shell, hist_path.as_deref(), lines)
}

pub fn capture_from(shell: String, hist_path: Option<&Path>, lines: usize) -> TerminalState {
    let history = match hist_path {
        None => vec![HISTORY_NOT_FOUND.to_string()],
        // zsh extended history may hold non-UTF-8 metadata; the tail reader repairs it.
        Some(path) => match tail::tail(path, lines) {
            Ok(history) => history,
            Err(TailError::NotFound(_)) => vec![HISTORY_NOT_FOUND.to_string()],
            Err(e) => {
                debug!(path = %path.display(), error = %e, "history read failed");
                vec![format!("Error reading history: {}", e)]
            }
        },
    };

    TerminalState { shell, history }
}
