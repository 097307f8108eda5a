/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/config.rs
 * Responsibility: YAML configuration structure, defaults and discovery
 */
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

const CONFIG_ENV_VAR: &str = "ENV_MCP_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tail: TailConfig,
    pub history: HistoryConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TailStrategy {
    /// Seek back `max_lines * bytes_per_line` bytes and accept whatever fits.
    #[default]
    Heuristic,
    /// Grow the backward window until enough line breaks are found.
    Exact,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TailConfig {
    pub threshold_bytes: u64,
    pub bytes_per_line: u64,
    pub default_max_lines: usize,
    pub strategy: TailStrategy,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: crate::tail::DEFAULT_THRESHOLD_BYTES,
            bytes_per_line: crate::tail::DEFAULT_BYTES_PER_LINE,
            default_max_lines: crate::tail::DEFAULT_MAX_LINES,
            strategy: TailStrategy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_lines: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_lines: 10 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    pub probe_timeout_secs: u64,
    pub max_tool_output_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            max_tool_output_bytes: 64 * 1024,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file at {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Resolve and load the configuration.
    /// Priority: CLI > Environment Variable > ~/.config/env-mcp/config.yml > Defaults
    pub fn discover(cli_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self::load(PathBuf::from(path));
        }

        if let Some(path) = default_config_path().filter(|p| p.is_file()) {
            return Self::load(path);
        }

        Ok(Self::default())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("env-mcp").join("config.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_yaml_keeps_defaults_for_missing_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "tail:\n  strategy: exact\nruntime:\n  probe_timeout_secs: 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tail.strategy, TailStrategy::Exact);
        assert_eq!(config.tail.bytes_per_line, 200);
        assert_eq!(config.tail.threshold_bytes, 1024 * 1024);
        assert_eq!(config.runtime.probe_timeout_secs, 5);
        assert_eq!(config.history.default_lines, 10);
    }

    #[test]
    fn test_exec_section_is_not_configurable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "exec:\n  timeout_secs: 0\n  denylist: []\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_discover_prefers_cli_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cli.yml");
        fs::write(&path, "history:\n  default_lines: 3\n").unwrap();

        let config = Config::discover(Some(path)).unwrap();
        assert_eq!(config.history.default_lines, 3);
    }
}
