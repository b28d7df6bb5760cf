//! Homelab Assistant: streaming tool execution for a local LLM.
//!
//! The model writes `EXECUTE_TOOL:` markers inline; the streaming pipeline
//! detects them as tokens arrive, runs each call once through an injected
//! executor (local tools or an MCP server fronting Proxmox, LXD and SSH),
//! and splices the results into the text shown to the operator.

pub mod agent;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod streaming;
pub mod tools;
pub mod types;
