/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/executor.rs
 * Responsibility: Guarded command execution with dry-run, denylist and timeout.
 */

//! Runs a caller-supplied command without a shell.
//!
//! The command string is split on whitespace and spawned as an argv, so shell
//! metacharacters, globs and `$VAR` references reach the program as literal
//! text. The denylist is a coarse second layer on top of that. There is no
//! quoting: an argument containing whitespace cannot be expressed.

use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DENYLIST: &[&str] = &[";", "&", "|", ">", "<", "`", "$("];
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of one `execute` call. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    DryRunPreview(String),
    Blocked(String),
    Success(String),
    Failure { exit_code: i32, stderr: String },
    ExecutionError(String),
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::DryRunPreview(_) | Self::Success(_))
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRunPreview(command) => write!(f, "[DRY RUN] Would execute: {}", command),
            Self::Blocked(reason) => write!(f, "Command blocked due to {}", reason),
            Self::Success(stdout) => write!(f, "Success:\n{}", stdout),
            Self::Failure { exit_code, stderr } => {
                write!(f, "Failure (Exit Code {}):\n{}", exit_code, stderr)
            }
            Self::ExecutionError(message) => write!(f, "Error executing command: {}", message),
        }
    }
}

/// Execution limits. The timeout is fixed at 30 s outside of tests and
/// never drops below one second.
#[derive(Debug, Clone)]
pub struct ExecPolicy {
    timeout: Duration,
}

impl Default for ExecPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ExecPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: timeout.max(MIN_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// First denylisted pattern found in `command`, in denylist order.
pub fn find_denied(command: &str) -> Option<&'static str> {
    DEFAULT_DENYLIST
        .iter()
        .copied()
        .find(|pattern| command.contains(pattern))
}

pub fn tokenize(command: &str) -> Vec<&str> {
    command.split_whitespace().collect()
}

pub async fn execute(command: &str, dry_run: bool, policy: &ExecPolicy) -> ExecutionResult {
    if dry_run {
        debug!(command, "dry run, nothing spawned");
        return ExecutionResult::DryRunPreview(command.to_string());
    }

    if let Some(pattern) = find_denied(command) {
        warn!(command, pattern, "command blocked by denylist");
        return ExecutionResult::Blocked(format!(
            "detected shell metacharacter `{}`: {}",
            pattern, command
        ));
    }

    let argv = tokenize(command);
    let Some((program, args)) = argv.split_first() else {
        return ExecutionResult::ExecutionError("empty command".to_string());
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(program, error = %e, "failed to spawn command");
            return ExecutionResult::ExecutionError(e.to_string());
        }
    };

    let started = Instant::now();
    // On timeout the wait future is dropped with the child, which kills it.
    let output = match tokio::time::timeout(policy.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return ExecutionResult::ExecutionError(e.to_string()),
        Err(_) => {
            warn!(command, timeout_secs = policy.timeout.as_secs(), "command timed out, killed");
            return ExecutionResult::ExecutionError("timed out".to_string());
        }
    };

    let exit_code = output.status.code();
    info!(
        command,
        exit_code = exit_code.unwrap_or(-1),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "command finished"
    );

    if output.status.success() {
        ExecutionResult::Success(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        ExecutionResult::Failure {
            exit_code: exit_code.unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
