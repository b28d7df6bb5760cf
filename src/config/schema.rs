//! Configuration schema for assistant.toml.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Ollama server base URL.
    pub ollama_url: String,

    /// Model used for chat.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Context window passed to Ollama.
    pub num_ctx: u32,

    /// JSON-RPC endpoint of the MCP tool server (Proxmox, LXD, SSH tools).
    pub mcp_url: Option<String>,

    /// Bearer token for the MCP endpoint.
    pub mcp_api_key: Option<String>,

    /// Per-call timeout for every tool, local or MCP, in seconds. Zero
    /// disables it.
    pub tool_timeout_secs: u64,

    /// Give up on a tool call whose arguments are still not valid JSON this
    /// many bytes after its marker. Unset means wait until the stream ends.
    pub max_pending_tool_bytes: Option<usize>,

    /// Tool output longer than this is truncated in the transcript.
    pub max_result_chars: usize,

    /// Extra operator instructions appended to the system prompt.
    pub system_prompt_extra: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".into(),
            model: "llama3.1".into(),
            temperature: 0.7,
            num_ctx: 8192,
            mcp_url: None,
            mcp_api_key: None,
            tool_timeout_secs: 60,
            max_pending_tool_bytes: None,
            max_result_chars: 4000,
            system_prompt_extra: String::new(),
            log_level: "info".into(),
        }
    }
}

impl AssistantConfig {
    /// Tool timeout as a duration; zero disables it.
    pub fn tool_timeout(&self) -> Option<std::time::Duration> {
        match self.tool_timeout_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }

    /// MCP endpoint, ignoring blank values.
    pub fn mcp_endpoint(&self) -> Option<&str> {
        self.mcp_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}
