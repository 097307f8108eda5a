/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/tools.rs
 * Responsibility: Tool definitions, argument handling and dispatch.
 */

use crate::config::{Config, TailStrategy};
use crate::executor::{self, ExecPolicy};
use crate::history;
use crate::runtime;
use crate::tail::{self, TailError, TailOptions};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

pub const TOOL_NAMES: &[&str] = &[
    "capture_terminal_state",
    "introspect_runtime",
    "secure_shell_executor",
    "read_error_file",
];

fn require_str_arg<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolExecutionResult> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolExecutionResult::error(format!("Error: Missing required argument `{}`.", field)))
}

fn optional_usize_arg(args: &Value, field: &str, default: usize) -> Result<usize, ToolExecutionResult> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| {
                ToolExecutionResult::error(format!(
                    "Error: Invalid argument `{}`: expected a non-negative integer, got {}.",
                    field, value
                ))
            }),
    }
}

fn optional_bool_arg(args: &Value, field: &str, default: bool) -> bool {
    args.get(field).and_then(Value::as_bool).unwrap_or(default)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn get_tool_definitions() -> Value {
    json!([
        {
            "name": "capture_terminal_state",
            "description": "Detects the shell type and reads the last lines of its history. Use this first to see which commands were run before the failure.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "lines": { "type": "integer", "description": "Number of history lines to return. Defaults to 10" }
                }
            }
        },
        {
            "name": "introspect_runtime",
            "description": "Returns a health report of the current directory and runtime environment (python, pip, node, npm, project files).",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        },
        {
            "name": "secure_shell_executor",
            "description": "Executes a fix command with a dry run safety layer. The command is split on whitespace and run without a shell; quoting, pipes, redirects and command chaining are not supported. Defaults to dry_run=true, which only previews the command.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to execute" },
                    "dry_run": { "type": "boolean", "description": "If true, only returns the command without executing it. Defaults to true" }
                },
                "required": ["command"]
            }
        },
        {
            "name": "read_error_file",
            "description": "Reads the last lines of a specific error log or crash report file. Use this when a previous command fails and points at a log file (e.g. 'See /tmp/error.log for details').",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Path to the log file. A leading ~ is expanded" },
                    "max_lines": { "type": "integer", "description": "Maximum number of trailing lines to return. Defaults to 100" },
                    "exact": { "type": "boolean", "description": "Scan backward until exactly max_lines lines are found, even for very long lines" }
                },
                "required": ["file_path"]
            }
        }
    ])
}

async fn run_read_error_file(args: &Value, config: &Config) -> ToolExecutionResult {
    let raw_path = match require_str_arg(args, "file_path") {
        Ok(path) => path,
        Err(err) => return err,
    };
    let path = expand_tilde(raw_path);
    let max_lines = match optional_usize_arg(args, "max_lines", config.tail.default_max_lines) {
        Ok(max_lines) => max_lines,
        Err(err) => return err,
    };

    let mut options = TailOptions::from(&config.tail);
    if optional_bool_arg(args, "exact", false) {
        options.strategy = TailStrategy::Exact;
    }

    let read = tokio::task::spawn_blocking(move || tail::tail_with(&path, max_lines, &options)).await;

    match read {
        Ok(Ok(lines)) => ToolExecutionResult::success(lines.join("\n")),
        Ok(Err(e @ TailError::ReadError(_))) => ToolExecutionResult::error(e.to_string()),
        Ok(Err(e)) => ToolExecutionResult::error(format!("Error: {}", e)),
        Err(e) => ToolExecutionResult::error(format!("Failed to read file: {}", e)),
    }
}

async fn run_secure_shell_executor(args: &Value) -> ToolExecutionResult {
    let command = match require_str_arg(args, "command") {
        Ok(command) => command,
        Err(err) => return err,
    };
    let dry_run = optional_bool_arg(args, "dry_run", true);

    let result = executor::execute(command, dry_run, &ExecPolicy::default()).await;
    ToolExecutionResult {
        output: result.to_string(),
        is_error: result.is_error(),
    }
}

pub async fn dispatch_tool(name: &str, args: &Value, config: &Config) -> ToolExecutionResult {
    debug!(tool = name, "dispatching tool call");

    // Log tails and command output go back whole; only the reports are capped.
    match name {
        "capture_terminal_state" => {
            let lines = match optional_usize_arg(args, "lines", config.history.default_lines) {
                Ok(lines) => lines,
                Err(err) => return err,
            };
            let report = history::capture_terminal_state(lines).to_string();
            ToolExecutionResult::success(truncate_output(report, config.runtime.max_tool_output_bytes))
        }
        "introspect_runtime" => {
            let timeout = Duration::from_secs(config.runtime.probe_timeout_secs);
            let report = runtime::introspect_runtime(timeout).await.to_string();
            ToolExecutionResult::success(truncate_output(report, config.runtime.max_tool_output_bytes))
        }
        "secure_shell_executor" => run_secure_shell_executor(args).await,
        "read_error_file" => run_read_error_file(args, config).await,
        _ => ToolExecutionResult::error(format!("Error: Unknown tool `{}`", name)),
    }
}

fn truncate_output(output: String, limit: usize) -> String {
    if limit == 0 || output.len() <= limit {
        return output;
    }

    let mut prefix_end = limit / 2;
    while prefix_end > 0 && !output.is_char_boundary(prefix_end) {
        prefix_end -= 1;
    }

    let mut suffix_start = output.len().saturating_sub(limit / 2);
    while suffix_start < output.len() && !output.is_char_boundary(suffix_start) {
        suffix_start += 1;
    }

    format!(
        "{} ... [TRUNCATED {} bytes] ... {}\n\nHint: Report is too large to return whole. Request fewer lines before retrying.",
        &output[..prefix_end],
        suffix_start - prefix_end,
        &output[suffix_start..]
    )
}
