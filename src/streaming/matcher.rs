//! Tool-call marker recognition.
//!
//! Models are prompted to request tools inline, e.g.
//!
//! ```text
//! **EXECUTE_TOOL:** list_containers {"node": "pve", "filter": {"status": "running"}}
//! ```
//!
//! A regex locates the marker and tool name; a brace scanner then finds the
//! end of the argument object, so nested objects are extracted intact.

use crate::types::ToolCall;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Marker, optional `**`/`` ` `` emphasis, tool name, and the opening brace.
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\*\*|`)?EXECUTE_TOOL:(?:\*\*|`)?\s+([\w-]+)\s+\{")
        .expect("marker regex is valid")
});

/// A marker whose argument object has not (yet) become valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMarker {
    pub tool_name: String,
    pub start_pos: usize,
    /// True when the braces balanced but the text still failed to parse.
    /// Such a marker can never become valid, since the buffer only grows.
    pub closed: bool,
}

/// Everything found in one pass over a buffer.
#[derive(Debug, Default)]
pub struct Scan {
    pub calls: Vec<ToolCall>,
    pub pending: Vec<PendingMarker>,
}

/// Find every completed tool call in `buffer`, left to right.
///
/// Candidates whose arguments do not parse as a JSON object are skipped
/// silently; they may still be streaming.
pub fn find_tool_calls(buffer: &str) -> Vec<ToolCall> {
    scan(buffer).calls
}

/// Scan `buffer` for completed calls and for markers still waiting on input.
pub fn scan(buffer: &str) -> Scan {
    let mut result = Scan::default();
    let mut pos = 0;

    while let Some(caps) = MARKER_RE.captures_at(buffer, pos) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let open = whole.end() - 1;

        match balanced_object_end(buffer, open) {
            Some(close) => match parse_arguments(&buffer[open..close]) {
                Some(arguments) => {
                    result.calls.push(ToolCall {
                        tool_name: name.as_str().to_string(),
                        arguments,
                        start_pos: whole.start(),
                        end_pos: close,
                        raw_text: buffer[whole.start()..close].to_string(),
                    });
                    pos = close;
                }
                None => {
                    result.pending.push(PendingMarker {
                        tool_name: name.as_str().to_string(),
                        start_pos: whole.start(),
                        closed: true,
                    });
                    pos = whole.end();
                }
            },
            None => {
                result.pending.push(PendingMarker {
                    tool_name: name.as_str().to_string(),
                    start_pos: whole.start(),
                    closed: false,
                });
                pos = whole.end();
            }
        }
    }

    result
}

/// Byte offset one past the `}` matching the `{` at `open`, if present.
///
/// Braces inside JSON string literals are ignored.
fn balanced_object_end(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_arguments(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
