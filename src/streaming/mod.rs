//! Streaming tool-call pipeline: detect `EXECUTE_TOOL:` markers in model
//! output as it arrives, run each call once, and splice the results into the
//! outgoing text stream.

pub mod manager;
pub mod matcher;
pub mod orchestrator;

pub use manager::{AbandonedCall, ChunkOutcome, StreamingToolManager};
pub use matcher::{find_tool_calls, scan, PendingMarker, Scan};
pub use orchestrator::{stream_with_tool_execution, OrchestratorOptions, ToolStreamOrchestrator};
