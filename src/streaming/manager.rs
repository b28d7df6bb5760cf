//! Per-response accumulation and deduplication of streamed tool calls.

use super::matcher;
use crate::types::{ExecutionSignature, ToolCall};
use std::collections::HashSet;
use tracing::{debug, warn};

/// What one `add_chunk` produced.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    /// The chunk, unmodified.
    pub display_text: String,
    /// Calls claimed by this chunk, in buffer order.
    pub new_tool_calls: Vec<ToolCall>,
    /// Markers given up on by this chunk (only with a pending limit).
    pub abandoned_calls: Vec<AbandonedCall>,
}

/// A marker whose arguments stayed unparseable past the pending limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedCall {
    pub tool_name: String,
    pub start_pos: usize,
}

/// Accumulates one streamed response and hands out each tool call once.
///
/// The buffer is append-only; every chunk triggers a rescan of the whole
/// buffer so markers split across chunks are found. Signatures are claimed
/// as soon as a call is detected, before it executes.
#[derive(Debug, Default)]
pub struct StreamingToolManager {
    buffer: String,
    executed: HashSet<ExecutionSignature>,
    pending_limit: Option<usize>,
    abandoned: HashSet<usize>,
}

impl StreamingToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report markers that stay unparseable once `limit` bytes have
    /// accumulated past their start.
    pub fn with_pending_limit(mut self, limit: Option<usize>) -> Self {
        self.pending_limit = limit;
        self
    }

    /// Append a chunk and return the calls it completed.
    pub fn add_chunk(&mut self, chunk: &str) -> ChunkOutcome {
        let mut outcome = ChunkOutcome {
            display_text: chunk.to_string(),
            ..Default::default()
        };
        if chunk.is_empty() {
            return outcome;
        }

        self.buffer.push_str(chunk);
        let scan = matcher::scan(&self.buffer);

        for call in scan.calls {
            let signature = call.signature();
            if self.executed.insert(signature) {
                debug!(
                    "Claimed tool call {} at {}..{}",
                    call.tool_name, call.start_pos, call.end_pos
                );
                outcome.new_tool_calls.push(call);
            }
        }

        if let Some(limit) = self.pending_limit {
            for marker in scan.pending {
                let age = self.buffer.len() - marker.start_pos;
                if age > limit && self.abandoned.insert(marker.start_pos) {
                    warn!(
                        "Abandoning tool call {} at {}: no valid arguments after {} bytes",
                        marker.tool_name, marker.start_pos, age
                    );
                    outcome.abandoned_calls.push(AbandonedCall {
                        tool_name: marker.tool_name,
                        start_pos: marker.start_pos,
                    });
                }
            }
        }

        outcome
    }

    /// Clear the buffer and claimed signatures, keeping their allocations.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.executed.clear();
        self.abandoned.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn has_executed(&self, signature: &ExecutionSignature) -> bool {
        self.executed.contains(signature)
    }
}
