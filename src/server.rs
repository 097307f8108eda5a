/*
 * Env MCP - Diagnostic and Remediation Tools for Agents
 * File Path: src/server.rs
 * Responsibility: Model Context Protocol server over newline-delimited JSON-RPC on stdio
 */

use crate::config::Config;
use crate::tools::{dispatch_tool, get_tool_definitions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "env-mcp";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

const INSTRUCTIONS: &str = "Diagnostic and remediation tools for a failing environment. \
Start with capture_terminal_state and introspect_runtime, read logs with read_error_file, \
and preview fixes with secure_shell_executor before running them with dry_run=false.";

/// JSON-RPC 2.0 request (or notification when `id` is absent)
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

pub struct McpServer {
    config: Config,
}

impl McpServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Handle one line of input. Returns the serialized response, or `None`
    /// for notifications and blank lines.
    pub async fn handle_line(&self, line: &str) -> Result<Option<String>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))),
            Ok(raw) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<JsonRpcRequest>(raw) {
                    Err(e) => Some(JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))),
                    Ok(req) => self.handle_request(req).await,
                }
            }
        };

        match response {
            Some(response) => Ok(Some(
                serde_json::to_string(&response).context("Failed to serialize JSON-RPC response")?,
            )),
            None => Ok(None),
        }
    }

    async fn handle_request(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = req.id else {
            debug!(method = %req.method, "notification received");
            return None;
        };

        if req.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                "Invalid JSON-RPC version, expected 2.0",
            ));
        }

        let params = req.params.unwrap_or(Value::Null);
        let response = match req.method.as_str() {
            "initialize" => JsonRpcResponse::result(id, self.method_initialize(&params)),
            "ping" => JsonRpcResponse::result(id, json!({})),
            "tools/list" => JsonRpcResponse::result(id, json!({ "tools": get_tool_definitions() })),
            "tools/call" => match self.method_tools_call(&params).await {
                Ok(result) => JsonRpcResponse::result(id, result),
                Err(message) => JsonRpcResponse::error(id, INVALID_PARAMS, message),
            },
            other => {
                warn!(method = other, "unknown method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other))
            }
        };
        Some(response)
    }

    fn method_initialize(&self, params: &Value) -> Value {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": INSTRUCTIONS
        })
    }

    async fn method_tools_call(&self, params: &Value) -> std::result::Result<Value, String> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| "Invalid params: missing tool `name`".to_string())?;
        let empty = json!({});
        let args = params.get("arguments").filter(|v| !v.is_null()).unwrap_or(&empty);

        let result = dispatch_tool(name, args, &self.config).await;
        Ok(json!({
            "content": [{ "type": "text", "text": result.output }],
            "isError": result.is_error
        }))
    }

    /// Serve until the reader reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read from client")? {
            if let Some(response) = self.handle_line(&line).await? {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await.context("Failed to write response")?;
            }
        }
        Ok(())
    }

    pub async fn serve_stdio(&self) -> Result<()> {
        info!(version = env!("CARGO_PKG_VERSION"), "env-mcp serving on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
        info!("stdin closed, shutting down");
        Ok(())
    }
}
