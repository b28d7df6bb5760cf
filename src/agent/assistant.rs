//! One chat turn: prompt the model and run its tool calls as they stream in.

use crate::agent::system_prompt;
use crate::config::AssistantConfig;
use crate::llm::OllamaClient;
use crate::mcp::McpClient;
use crate::streaming::{OrchestratorOptions, ToolStreamOrchestrator};
use crate::tools::{FallbackExecutor, ToolDefinition, ToolExecutor, ToolRegistry};
use crate::types::ChatMessage;
use futures::Stream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wires the model, the tool executor, and the streaming orchestrator.
pub struct Assistant {
    config: AssistantConfig,
    llm: OllamaClient,
    executor: Arc<dyn ToolExecutor>,
    orchestrator: ToolStreamOrchestrator,
}

impl Assistant {
    pub fn new(config: AssistantConfig, llm: OllamaClient, executor: Arc<dyn ToolExecutor>) -> Self {
        let orchestrator = ToolStreamOrchestrator::new(executor.clone()).with_options(OrchestratorOptions {
            max_result_chars: Some(config.max_result_chars),
            max_pending_tool_bytes: config.max_pending_tool_bytes,
        });
        Self {
            config,
            llm,
            executor,
            orchestrator,
        }
    }

    /// Build an assistant from config: builtin tools locally, everything
    /// else over MCP when an endpoint is configured.
    pub fn from_config(config: AssistantConfig) -> Self {
        let llm = OllamaClient::new(&config.ollama_url, &config.model)
            .with_options(config.temperature, config.num_ctx);
        Self::new(config.clone(), llm, build_executor(&config))
    }

    /// Tools advertised to the model. A failing remote listing degrades to
    /// whatever the executor can still describe.
    pub async fn available_tools(&self) -> Vec<ToolDefinition> {
        match self.executor.definitions().await {
            Ok(defs) => defs,
            Err(e) => {
                warn!("Could not list tools: {:#}", e);
                ToolRegistry::with_builtins().tool_definitions()
            }
        }
    }

    /// Conversation for one turn: system prompt, prior history, then `prompt`.
    pub async fn build_messages(&self, history: &[ChatMessage], prompt: &str) -> Vec<ChatMessage> {
        let tools = self.available_tools().await;
        info!("{} tools available", tools.len());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt::build_system_prompt(
            &self.config,
            &tools,
        )));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Stream the model's reply with tool results inlined.
    pub fn stream_reply(
        &self,
        messages: &[ChatMessage],
        cancel: CancellationToken,
    ) -> impl Stream<Item = String> + Send + 'static {
        info!("Asking {}", self.llm.model());
        self.orchestrator.stream(self.llm.chat_stream(messages), cancel)
    }
}

/// Local builtins, falling back to the MCP server for unknown tools.
pub fn build_executor(config: &AssistantConfig) -> Arc<dyn ToolExecutor> {
    let mut registry = ToolRegistry::with_builtins();
    if let Some(timeout) = config.tool_timeout() {
        registry = registry.with_timeout(timeout);
    }

    let remote: Option<Arc<dyn ToolExecutor>> = config
        .mcp_endpoint()
        .map(|url| Arc::new(McpClient::new(url, config.mcp_api_key.clone())) as Arc<dyn ToolExecutor>);

    Arc::new(FallbackExecutor::new(registry, remote))
}
