//! Tools module
//!
//! Local tools the agent can call during an execution: sandboxed git,
//! file, and shell operations, plus the registry that exposes their
//! schemas to the model and dispatches calls by name.

pub mod exec;
pub mod fs;
pub mod git;
pub mod sandbox;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::xpander::types::{ToolCall, ToolOutput, ToolSpec};
pub use sandbox::Sandbox;

/// Context a tool invocation runs in.
pub struct ToolContext<'a> {
    pub sandbox: &'a Sandbox,
    pub thread_id: &'a str,
}

/// A tool executed in-process, inside the thread's sandbox.
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the tool input object.
    fn input_schema(&self) -> Value;

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value>;
}

/// Registry of the local tools available to the agent.
pub struct ToolRegistry {
    sandbox: Sandbox,
    tools: Vec<Arc<dyn LocalTool>>,
}

impl ToolRegistry {
    /// The standard coder tool set.
    pub fn standard(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            tools: vec![
                Arc::new(git::GitCloneTool),
                Arc::new(git::CommitAndPushTool),
                Arc::new(git::GitStatusTool),
                Arc::new(fs::ReadFileTool),
                Arc::new(fs::WriteFileTool),
                Arc::new(fs::DescribeTreeTool),
                Arc::new(exec::ExecuteCommandTool),
            ],
        }
    }

    /// Schemas of all registered tools, for the model's tool config.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|tool| tool.name() == name)
    }

    /// Run a tool call, converting any failure into an error output the
    /// model can observe.
    pub async fn dispatch(&self, thread_id: &str, call: &ToolCall) -> ToolOutput {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == call.name) else {
            warn!(name = %call.name, "Unknown local tool requested");
            return ToolOutput::error(call, format!("unknown tool: {}", call.name));
        };

        let ctx = ToolContext {
            sandbox: &self.sandbox,
            thread_id,
        };

        match tool.invoke(&ctx, call.input.clone()).await {
            Ok(payload) => ToolOutput::ok(call, payload),
            Err(e) => {
                warn!(name = %call.name, error = %e, "Tool invocation failed");
                ToolOutput::error(call, e.to_string())
            }
        }
    }
}

/// Extract a required string argument from a tool input object.
pub(crate) fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    match input.get(key).and_then(Value::as_str) {
        Some(value) => Ok(value),
        None => bail!("missing required argument: {}", key),
    }
}

/// Extract an optional string argument.
pub(crate) fn optional_str<'a>(input: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => bail!("argument {} must be a string", key),
    }
}

/// Extract an optional unsigned integer argument.
pub(crate) fn optional_u64(input: &Value, key: &str) -> Result<Option<u64>> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(n) => Ok(Some(n)),
            None => bail!("argument {} must be a non-negative integer", key),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ToolRegistry) {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path().join("sandboxes")).unwrap();
        (dir, ToolRegistry::standard(sandbox))
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            input,
        }
    }

    #[test]
    fn test_standard_registry_specs() {
        let (_dir, registry) = registry();
        let specs = registry.specs();

        assert!(registry.contains("git_clone"));
        assert!(registry.contains("execute_command"));
        assert!(!registry.contains("launch_rockets"));

        let write = specs.iter().find(|s| s.name == "write_file").unwrap();
        assert_eq!(write.input_schema["required"][0], "path");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let (_dir, registry) = registry();
        let out = registry.dispatch("t", &call("nope", json!({}))).await;
        assert!(!out.success);
        assert!(out.payload["error"]
            .as_str()
            .unwrap()
            .contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_dispatch_write_then_read() {
        let (_dir, registry) = registry();

        let out = registry
            .dispatch(
                "t",
                &call("write_file", json!({ "path": "a.txt", "content": "hello" })),
            )
            .await;
        assert!(out.success, "write failed: {}", out.payload);

        let out = registry
            .dispatch("t", &call("read_file", json!({ "path": "a.txt" })))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["content"], "hello");
    }

    #[tokio::test]
    async fn test_dispatch_missing_argument_is_tool_error() {
        let (_dir, registry) = registry();
        let out = registry.dispatch("t", &call("read_file", json!({}))).await;
        assert!(!out.success);
        assert!(out.payload["error"]
            .as_str()
            .unwrap()
            .contains("missing required argument"));
    }

    #[tokio::test]
    async fn test_dispatch_traversal_is_tool_error() {
        let (_dir, registry) = registry();
        let out = registry
            .dispatch(
                "t",
                &call("write_file", json!({ "path": "../x", "content": "" })),
            )
            .await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn test_dispatch_describe_tree() {
        let (_dir, registry) = registry();

        registry
            .dispatch(
                "t",
                &call("write_file", json!({ "path": "d/a.txt", "content": "x" })),
            )
            .await;

        let out = registry.dispatch("t", &call("describe_tree", json!({}))).await;
        assert!(out.success);
        assert_eq!(out.payload["tree"][0]["type"], "directory");
        assert_eq!(out.payload["tree"][0]["children"][0]["path"], "d/a.txt");
    }
}
