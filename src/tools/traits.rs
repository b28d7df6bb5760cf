//! Tool and executor traits.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition of a tool advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single locally implemented tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as written after the `EXECUTE_TOOL:` marker.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: &Map<String, Value>) -> Result<String>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Capability that runs a named tool and renders its result as text.
///
/// The streaming pipeline only ever sees this trait; implementations decide
/// whether a call runs locally, over MCP, or somewhere else. One executor is
/// typically shared by many concurrent sessions.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String>;

    /// Tools this executor can run, for prompt building and listings.
    async fn definitions(&self) -> Result<Vec<ToolDefinition>> {
        Ok(Vec::new())
    }
}
