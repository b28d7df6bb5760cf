pub mod builtin;
pub mod traits;

pub use traits::{Tool, ToolDefinition, ToolExecutor};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Typed failures raised by local tools and the registry.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing '{0}' argument")]
    MissingArgument(&'static str),

    #[error("invalid '{name}' argument: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
}

/// Fetch a required string argument.
pub fn require_str<'a>(args: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, ToolError> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ToolError::InvalidArgument {
            name,
            reason: format!("expected string, got {}", other),
        }),
        None => Err(ToolError::MissingArgument(name)),
    }
}

/// Run a tool future, failing with [`ToolError::Timeout`] past `limit`.
async fn bounded<F>(tool_name: &str, limit: Option<Duration>, call: F) -> Result<String>
where
    F: std::future::Future<Output = Result<String>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool_name.to_string(),
                secs: limit.as_secs(),
            })?,
        None => call.await,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Executor over locally registered [`Tool`]s.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: None,
        }
    }

    /// Registry preloaded with the builtin tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in builtin::builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Bound each execution; a call running longer fails with [`ToolError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a tool, replacing any existing tool of the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String> {
        let tool = self
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        debug!("Running local tool {}", tool_name);
        bounded(tool_name, self.timeout, tool.execute(arguments)).await
    }

    async fn definitions(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.tool_definitions())
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Runs local tools itself and forwards everything else to a remote executor.
/// Remote calls are bounded by the registry's timeout as well.
pub struct FallbackExecutor {
    local: ToolRegistry,
    remote: Option<Arc<dyn ToolExecutor>>,
}

impl FallbackExecutor {
    pub fn new(local: ToolRegistry, remote: Option<Arc<dyn ToolExecutor>>) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl ToolExecutor for FallbackExecutor {
    async fn execute(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String> {
        match &self.remote {
            Some(remote) if !self.local.contains(tool_name) => {
                debug!("Forwarding {} to remote executor", tool_name);
                bounded(tool_name, self.local.timeout, remote.execute(tool_name, arguments)).await
            }
            _ => self.local.execute(tool_name, arguments).await,
        }
    }

    async fn definitions(&self) -> Result<Vec<ToolDefinition>> {
        let mut defs = self.local.tool_definitions();
        if let Some(remote) = &self.remote {
            for def in remote.definitions().await? {
                if !self.local.contains(&def.name) {
                    defs.push(def);
                }
            }
        }
        Ok(defs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps for a while"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: &Map<String, Value>) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("done".into())
        }
    }

    struct Remote;

    #[async_trait]
    impl ToolExecutor for Remote {
        async fn execute(&self, tool_name: &str, _: &Map<String, Value>) -> Result<String> {
            Ok(format!("remote:{}", tool_name))
        }

        async fn definitions(&self) -> Result<Vec<ToolDefinition>> {
            Ok(vec![
                ToolDefinition {
                    name: "proxmox_list_vms".into(),
                    description: "List VMs".into(),
                    parameters: json!({}),
                },
                ToolDefinition {
                    name: "echo".into(),
                    description: "Shadowed by the local echo".into(),
                    parameters: json!({}),
                },
            ])
        }
    }

    struct HungRemote;

    #[async_trait]
    impl ToolExecutor for HungRemote {
        async fn execute(&self, _: &str, _: &Map<String, Value>) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("finally".into())
        }
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::with_builtins();
        let err = registry.execute("nope", &Map::new()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::UnknownTool(n)) if n == "nope"));
    }

    #[tokio::test]
    async fn timeout_is_enforced() {
        tokio::time::pause();
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(1));
        registry.register(Box::new(Slow));
        let err = registry.execute("slow", &Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "tool 'slow' timed out after 1s");
    }

    #[tokio::test]
    async fn register_replaces_same_name() {
        let mut registry = ToolRegistry::with_builtins();
        let before = registry.tool_definitions().len();
        registry.register(Box::new(builtin::Echo));
        assert_eq!(registry.tool_definitions().len(), before);
    }

    #[tokio::test]
    async fn fallback_prefers_local_tools() {
        let exec = FallbackExecutor::new(ToolRegistry::with_builtins(), Some(Arc::new(Remote) as Arc<dyn ToolExecutor>));
        let local = exec.execute("echo", &args(json!({"text": "hi"}))).await.unwrap();
        assert_eq!(local, "hi");
        let remote = exec.execute("proxmox_list_vms", &Map::new()).await.unwrap();
        assert_eq!(remote, "remote:proxmox_list_vms");
    }

    #[tokio::test]
    async fn fallback_bounds_remote_calls() {
        tokio::time::pause();
        let exec = FallbackExecutor::new(
            ToolRegistry::with_builtins().with_timeout(Duration::from_secs(1)),
            Some(Arc::new(HungRemote) as Arc<dyn ToolExecutor>),
        );
        let err = exec.execute("lxd_list_containers", &Map::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolError>(),
            Some(ToolError::Timeout { tool, secs: 1 }) if tool == "lxd_list_containers"
        ));
    }

    #[tokio::test]
    async fn fallback_without_remote_reports_unknown() {
        let exec = FallbackExecutor::new(ToolRegistry::with_builtins(), None);
        assert!(exec.execute("proxmox_list_vms", &Map::new()).await.is_err());
    }

    #[tokio::test]
    async fn fallback_merges_definitions() {
        let exec = FallbackExecutor::new(ToolRegistry::with_builtins(), Some(Arc::new(Remote) as Arc<dyn ToolExecutor>));
        let names: Vec<String> = exec.definitions().await.unwrap().into_iter().map(|d| d.name).collect();
        assert!(names.contains(&"proxmox_list_vms".to_string()));
        assert_eq!(names.iter().filter(|n| *n == "echo").count(), 1);
    }

    #[test]
    fn require_str_reports_type_errors() {
        let a = args(json!({"host": 5}));
        assert!(matches!(require_str(&a, "host"), Err(ToolError::InvalidArgument { name: "host", .. })));
        assert!(matches!(require_str(&a, "port"), Err(ToolError::MissingArgument("port"))));
    }
}
