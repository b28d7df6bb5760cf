//! System prompt builder.
//!
//! Layers (in order):
//! 1. Core identity (what the assistant is for)
//! 2. Tool-call convention
//! 3. Available tools
//! 4. Operator instructions from config

use crate::config::AssistantConfig;
use crate::tools::ToolDefinition;
use tracing::debug;

const CORE_IDENTITY: &str = r#"
# Identity

You are a homelab automation assistant. You help the operator inspect and
manage their infrastructure: Proxmox nodes and VMs, LXD containers, and hosts
reachable over SSH. Be concise. Never guess at the state of a machine when a
tool can tell you.
"#;

const TOOL_CONVENTION: &str = r#"
# Calling Tools

To run a tool, write a line of the exact form:

**EXECUTE_TOOL:** tool_name {"argument": "value"}

- The arguments must be a single valid JSON object, even when empty: `{}`.
- Write each distinct call once. Repeating an identical call does not run it
  again.
- The result is inserted into the conversation right after your call. Keep
  writing after the call; do not invent its output.
"#;

/// Build the complete system prompt.
pub fn build_system_prompt(config: &AssistantConfig, tools: &[ToolDefinition]) -> String {
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(CORE_IDENTITY);
    prompt.push('\n');

    prompt.push_str(TOOL_CONVENTION);
    prompt.push('\n');

    if tools.is_empty() {
        prompt.push_str("# Available Tools\n\nNo tools are available right now.\n");
    } else {
        prompt.push_str("# Available Tools\n\n");
        for tool in tools {
            prompt.push_str(&format!("- `{}`: {}\n", tool.name, tool.description));
            if let Some(props) = tool.parameters.get("properties").and_then(|p| p.as_object()) {
                if !props.is_empty() {
                    let names: Vec<&str> = props.keys().map(String::as_str).collect();
                    prompt.push_str(&format!("  arguments: {}\n", names.join(", ")));
                }
            }
        }
    }

    if !config.system_prompt_extra.trim().is_empty() {
        prompt.push_str("\n# Operator Instructions\n\n");
        prompt.push_str(config.system_prompt_extra.trim());
        prompt.push('\n');
    }

    debug!("System prompt: {} chars", prompt.len());
    prompt
}
