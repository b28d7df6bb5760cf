//! Shared types used across the assistant runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Detected tool calls
// ---------------------------------------------------------------------------

/// A tool invocation found in streamed model output.
///
/// Only constructed once the argument text parses as a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    /// Byte offset of the first character of the marker in the buffer.
    pub start_pos: usize,
    /// Byte offset one past the closing brace of the arguments.
    pub end_pos: usize,
    /// The exact matched text, marker included.
    pub raw_text: String,
}

impl ToolCall {
    /// Deduplication key for this call.
    pub fn signature(&self) -> ExecutionSignature {
        ExecutionSignature::new(&self.tool_name, &self.arguments)
    }

    /// `[start, end)` span of the matched text.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start_pos..self.end_pos
    }
}

/// Tool name plus key-sorted JSON arguments.
///
/// Two calls with the same signature are the same dispatch, regardless of
/// where they appear in the buffer or how their keys were ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionSignature {
    tool_name: String,
    canonical_arguments: String,
}

impl ExecutionSignature {
    pub fn new(tool_name: &str, arguments: &Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            canonical_arguments: canonical_json(&Value::Object(arguments.clone())),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn canonical_arguments(&self) -> &str {
        &self.canonical_arguments
    }
}

impl fmt::Display for ExecutionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tool_name, self.canonical_arguments)
    }
}

/// Serialize a JSON value with object keys sorted at every depth.
///
/// Does not rely on the map ordering `serde_json` happens to be built with,
/// since `preserve_order` may be switched on by another crate in the graph.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Chat types
// ---------------------------------------------------------------------------

/// A chat message sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}
