//! Drives a model's chunk stream through tool detection and execution.
//!
//! For each non-blank chunk the output carries, in order:
//! 1. the chunk itself, unmodified
//! 2. a notice for every call given up on (only with a pending limit)
//! 3. one annotation per newly detected call, each emitted after that call
//!    finished and before the next one starts
//!
//! Cancellation is checked between chunks only; a tool already running is
//! allowed to finish.

use super::manager::StreamingToolManager;
use crate::tools::ToolExecutor;
use crate::types::ToolCall;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for one orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Truncate tool results longer than this many characters.
    pub max_result_chars: Option<usize>,
    /// Give up on markers whose arguments stay invalid this many bytes later.
    pub max_pending_tool_bytes: Option<usize>,
}

/// Runs streamed model output against a shared tool executor.
#[derive(Clone)]
pub struct ToolStreamOrchestrator {
    executor: Arc<dyn ToolExecutor>,
    options: OrchestratorOptions,
}

impl ToolStreamOrchestrator {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Turn a chunk stream into display text interleaved with tool results.
    ///
    /// Each call gets a fresh [`StreamingToolManager`], so concurrent
    /// sessions never share dedup state.
    pub fn stream<S>(&self, chunks: S, cancel: CancellationToken) -> impl Stream<Item = String> + Send + 'static
    where
        S: Stream<Item = anyhow::Result<String>> + Send + 'static,
    {
        let executor = self.executor.clone();
        let options = self.options.clone();

        async_stream::stream! {
            let mut manager =
                StreamingToolManager::new().with_pending_limit(options.max_pending_tool_bytes);
            let mut chunks = Box::pin(chunks);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = chunks.next() => Some(next),
                };

                let chunk = match next {
                    None => {
                        info!("Stream cancelled after {} tool calls", manager.executed_count());
                        yield cancelled_notice();
                        break;
                    }
                    Some(None) => break,
                    Some(Some(Err(e))) => {
                        error!("Chunk stream failed: {:#}", e);
                        yield stream_error_notice(&e);
                        break;
                    }
                    Some(Some(Ok(chunk))) => chunk,
                };

                if chunk.trim().is_empty() {
                    continue;
                }

                yield chunk.clone();
                let outcome = manager.add_chunk(&chunk);

                for abandoned in &outcome.abandoned_calls {
                    yield abandoned_notice(&abandoned.tool_name, options.max_pending_tool_bytes.unwrap_or_default());
                }

                for call in &outcome.new_tool_calls {
                    yield execute_call(executor.as_ref(), call, &options).await;
                }
            }

            debug!("Tool stream finished ({} bytes buffered)", manager.buffer().len());
        }
    }
}

/// Convenience wrapper for a one-off stream with default options.
pub fn stream_with_tool_execution<S>(
    chunks: S,
    executor: Arc<dyn ToolExecutor>,
    cancel: CancellationToken,
) -> impl Stream<Item = String> + Send + 'static
where
    S: Stream<Item = anyhow::Result<String>> + Send + 'static,
{
    ToolStreamOrchestrator::new(executor).stream(chunks, cancel)
}

async fn execute_call(
    executor: &dyn ToolExecutor,
    call: &ToolCall,
    options: &OrchestratorOptions,
) -> String {
    info!("Tool: {}({})", call.tool_name, serde_json::Value::Object(call.arguments.clone()));

    match executor.execute(&call.tool_name, &call.arguments).await {
        Ok(output) => {
            info!("Tool result: {} chars", output.len());
            tool_result_annotation(&call.tool_name, &output, options.max_result_chars)
        }
        Err(e) => {
            warn!("Tool {} failed: {:#}", call.tool_name, e);
            tool_error_annotation(&call.tool_name, &format!("{:#}", e))
        }
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

fn tool_result_annotation(tool_name: &str, output: &str, max_chars: Option<usize>) -> String {
    let body = match max_chars {
        Some(max) => truncate_chars(output, max),
        None => output.to_string(),
    };
    format!("\n\n**Tool `{}` result:**\n```\n{}\n```\n\n", tool_name, body.trim_end())
}

fn tool_error_annotation(tool_name: &str, message: &str) -> String {
    format!("\n\n**Tool `{}` failed:** {}\n\n", tool_name, message)
}

fn abandoned_notice(tool_name: &str, limit: usize) -> String {
    format!(
        "\n\n**Malformed tool call** `{}`: arguments still not valid JSON after {} bytes, waiting for completion\n\n",
        tool_name, limit
    )
}

fn cancelled_notice() -> String {
    "\n\n*[Response cancelled]*\n".to_string()
}

fn stream_error_notice(error: &anyhow::Error) -> String {
    format!("\n\n**Streaming error:** {:#}\n", error)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => {
            let omitted = text[cut..].chars().count();
            format!("{}\n... ({} more characters truncated)", &text[..cut], omitted)
        }
        None => text.to_string(),
    }
}
