//! xpander API Types
//!
//! Data model shared between the control-plane client, the agent loop,
//! and the execution listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Instructions attached to a remote agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub goal: String,

    #[serde(default)]
    pub general: String,
}

impl Instructions {
    /// Render the instructions as a single system prompt.
    ///
    /// Empty sections are skipped so a partially configured agent still
    /// produces a usable prompt.
    pub fn system_prompt(&self) -> String {
        let mut parts = Vec::new();
        if !self.role.is_empty() {
            parts.push(self.role.clone());
        }
        if !self.general.is_empty() {
            parts.push(self.general.clone());
        }
        if !self.goal.is_empty() {
            parts.push(format!("Goal: {}", self.goal));
        }
        parts.join("\n\n")
    }
}

/// How the model is asked to select tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    #[default]
    Auto,
    /// The model must call at least one tool per turn.
    Required,
}

/// Schema of a tool the agent may call, in JSON Schema form.
///
/// Covers both remote operations attached to the agent on the control
/// plane and the local sandbox tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool input object.
    pub input_schema: Value,
}

/// Remote agent descriptor returned by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub organization_id: String,
    pub name: String,

    #[serde(default)]
    pub instructions: Instructions,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Operations attached to the agent on the control plane.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// Execution request received over the listener (or from the chat REPL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Identifier for this execution, generated when the caller omits it.
    #[serde(default = "new_execution_id")]
    pub execution_id: String,

    /// User input to run.
    pub input: String,

    /// Existing thread to continue; a new thread is created when absent.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl ExecutionRequest {
    /// Create a request for a fresh thread.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            execution_id: new_execution_id(),
            input: input.into(),
            thread_id: None,
        }
    }

    /// Create a request continuing an existing thread.
    pub fn on_thread(input: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            execution_id: new_execution_id(),
            input: input.into(),
            thread_id: Some(thread_id.into()),
        }
    }
}

fn new_execution_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lifecycle status of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Executing => write!(f, "executing"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a completed execution, reported back to the caller and to
/// the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub thread_id: String,
    pub status: ExecutionStatus,

    /// Final assistant text for the execution.
    pub result: String,

    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Model-assigned identifier correlating the call with its result.
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub name: String,
    pub success: bool,
    pub payload: Value,
}

impl ToolOutput {
    /// Successful invocation with a JSON payload.
    pub fn ok(call: &ToolCall, payload: Value) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            success: true,
            payload,
        }
    }

    /// Failed invocation carrying the error message.
    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            success: false,
            payload: serde_json::json!({ "error": message.into() }),
        }
    }
}

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block inside a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { id: String, success: bool, payload: Value },
}

/// One message in a thread transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

impl ChatMessage {
    /// Plain user text message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::Text { text: text.into() }],
        }
    }

    /// User message carrying tool results back to the model.
    pub fn tool_results(outputs: &[ToolOutput]) -> Self {
        Self {
            role: Role::User,
            content: outputs
                .iter()
                .map(|out| ContentItem::ToolResult {
                    id: out.call_id.clone(),
                    success: out.success,
                    payload: out.payload.clone(),
                })
                .collect(),
        }
    }

    /// Concatenated text blocks of the message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool calls requested by this message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
