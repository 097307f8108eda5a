/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/lib.rs
 * Responsibility: Shared library modules
 */

pub mod config;
pub mod executor;
pub mod history;
pub mod runtime;
pub mod server;
pub mod tail;
pub mod tools;

/// Initialize `tracing` on stderr; stdout carries the JSON-RPC stream.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
