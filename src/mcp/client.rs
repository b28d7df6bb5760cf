//! HTTP client for an MCP tool server speaking JSON-RPC 2.0.
//!
//! Only `tools/list` and `tools/call` are used; session setup and transport
//! negotiation belong to the server side.

use crate::tools::{ToolDefinition, ToolExecutor};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Failures talking to the MCP server.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("MCP server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid MCP response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    ToolReportedError(String),
}

/// MCP tool server client.
#[derive(Debug)]
pub struct McpClient {
    url: String,
    api_key: Option<String>,
    http: reqwest::Client,
    next_id: AtomicU64,
}

// -- JSON-RPC envelopes ------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorPayload {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct CallToolParams<'a> {
    name: &'a str,
    arguments: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentItem {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    tools: Vec<ToolInfo>,
}

#[derive(Debug, Deserialize)]
struct ToolInfo {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "inputSchema")]
    input_schema: Value,
}

impl McpClient {
    /// Create a client for the JSON-RPC endpoint at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
        parse_tool_list(result)
    }

    /// Call a tool and return its text output.
    pub async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<String, McpError> {
        let result = self
            .request("tools/call", CallToolParams { name, arguments })
            .await?;
        parse_call_result(result)
    }

    async fn request<P: Serialize>(&self, method: &str, params: P) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("MCP request #{}: {}", id, method);

        let mut req = self.http.post(&self.url).json(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: RpcResponse = resp.json().await?;
        unwrap_rpc(body)
    }
}

fn unwrap_rpc(body: RpcResponse) -> Result<Value, McpError> {
    if let Some(err) = body.error {
        return Err(McpError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| McpError::InvalidResponse("neither result nor error present".into()))
}

fn parse_call_result(result: Value) -> Result<String, McpError> {
    let parsed: CallToolResult =
        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse(e.to_string()))?;

    let text = parsed
        .content
        .into_iter()
        .filter_map(|item| match item {
            ContentItem::Text { text } => Some(text),
            ContentItem::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if parsed.is_error {
        Err(McpError::ToolReportedError(text))
    } else {
        Ok(text)
    }
}

fn parse_tool_list(result: Value) -> Result<Vec<ToolDefinition>, McpError> {
    let parsed: ListToolsResult =
        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse(e.to_string()))?;

    Ok(parsed
        .tools
        .into_iter()
        .map(|t| ToolDefinition {
            name: t.name,
            description: t.description,
            parameters: t.input_schema,
        })
        .collect())
}

#[async_trait]
impl ToolExecutor for McpClient {
    async fn execute(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String> {
        Ok(self.call_tool(tool_name, arguments).await?)
    }

    async fn definitions(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.list_tools().await?)
    }
}
