//! Tools that run in-process without any infrastructure behind them.

use super::{require_str, Tool};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub fn builtin_tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(HelloWorld), Box::new(CurrentTime), Box::new(Echo)]
}

/// Connectivity check for the tool pipeline.
pub struct HelloWorld;

#[async_trait]
impl Tool for HelloWorld {
    fn name(&self) -> &str {
        "hello_world"
    }

    fn description(&self) -> &str {
        "Return a greeting. Useful to verify that tool calls work."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Who to greet"
                }
            }
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        match args.get("name").and_then(Value::as_str) {
            Some(name) => Ok(format!("Hello, {}!", name)),
            None => Ok("Hello from the homelab assistant!".into()),
        }
    }
}

/// Current UTC time.
pub struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Return the current UTC time in RFC 3339 format."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: &Map<String, Value>) -> Result<String> {
        Ok(chrono::Utc::now().to_rfc3339())
    }
}

pub struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        Ok(require_str(args, "text")?.to_string())
    }
}
