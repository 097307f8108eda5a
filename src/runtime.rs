/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/runtime.rs
 * Responsibility: Runtime introspection (python, pip, node, npm, local project files)
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const PROJECT_FILES: &[&str] = &[".env", "pyproject.toml", "package.json", "requirements.txt", "uv.lock"];
const PIP_PACKAGE_LIMIT: usize = 20;
const NPM_PACKAGE_LIMIT: usize = 9;

#[derive(Debug, Clone, Default)]
pub struct RuntimeReport {
    /// `(version, interpreter path)`
    pub python: Option<(String, String)>,
    pub pip_packages: Option<Vec<String>>,
    pub node_version: Option<String>,
    pub npm_packages: Option<Vec<String>>,
    pub current_directory: PathBuf,
    pub config_files: Vec<String>,
}

impl fmt::Display for RuntimeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.python {
            Some((version, path)) => writeln!(f, "Python: {} at {}", version, path)?,
            None => writeln!(f, "Python: Not found")?,
        }

        match &self.pip_packages {
            Some(packages) => writeln!(f, "Pip Packages (partial): {}", packages.join(", "))?,
            None => writeln!(f, "Pip: Failed to list packages")?,
        }

        if let Some(version) = &self.node_version {
            writeln!(f, "Node: {}", version)?;
        }
        match (&self.node_version, &self.npm_packages) {
            (Some(_), Some(packages)) => writeln!(f, "NPM Packages (partial): {}", packages.join(", "))?,
            _ => writeln!(f, "Node/NPM: Not found or failed to list")?,
        }

        writeln!(f, "Current Directory: {}", self.current_directory.display())?;
        write!(f, "Config Files: {}", self.config_files.join(", "))
    }
}

pub fn parse_pip_list(stdout: &str) -> Vec<String> {
    // Skip the "Package Version" header and its dashed underline.
    stdout
        .lines()
        .skip(2)
        .take(PIP_PACKAGE_LIMIT)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub fn parse_npm_list(stdout: &str) -> Vec<String> {
    // First line is the project root.
    stdout
        .lines()
        .skip(1)
        .take(NPM_PACKAGE_LIMIT)
        .map(str::to_string)
        .collect()
}

pub fn collect_config_files(dir: &Path) -> Vec<String> {
    PROJECT_FILES
        .iter()
        .filter(|name| dir.join(name).exists())
        .map(|name| name.to_string())
        .collect()
}

/// Run one probe as an argv spawn. `None` on spawn failure, nonzero exit or timeout.
async fn probe(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let output_future = cmd.output();

    match tokio::time::timeout(timeout, output_future).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            debug!(program, code = output.status.code().unwrap_or(-1), "probe exited nonzero");
            None
        }
        Ok(Err(e)) => {
            debug!(program, error = %e, "probe failed to spawn");
            None
        }
        Err(_) => {
            debug!(program, timeout_secs = timeout.as_secs(), "probe timed out");
            None
        }
    }
}

pub async fn introspect_runtime(probe_timeout: Duration) -> RuntimeReport {
    let python_path = probe("which", &["python3"], probe_timeout).await;
    let python_version = probe("python3", &["--version"], probe_timeout).await;
    let python = match (python_version, python_path) {
        (Some(version), Some(path)) => Some((version.trim().to_string(), path.trim().to_string())),
        _ => None,
    };

    let pip_packages = probe("pip", &["list"], probe_timeout)
        .await
        .map(|out| parse_pip_list(&out));

    let node_version = probe("node", &["--version"], probe_timeout)
        .await
        .map(|out| out.trim().to_string());
    let npm_packages = match node_version {
        Some(_) => probe("npm", &["list", "--depth=0"], probe_timeout)
            .await
            .map(|out| parse_npm_list(&out)),
        None => None,
    };

    let current_directory = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_files = collect_config_files(&current_directory);

    RuntimeReport {
        python,
        pip_packages,
        node_version,
        npm_packages,
        current_directory,
        config_files,
    }
}
