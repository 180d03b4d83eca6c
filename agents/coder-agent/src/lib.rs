//! Coder Agent Library
//!
//! This crate provides the core functionality for the xpander.ai coder
//! agent launcher: environment configuration, the xpander control-plane
//! client, the Bedrock-backed agent loop, sandboxed local tools, and the
//! local execution listener.

pub mod agent;
pub mod cli;
pub mod llm;
pub mod server;
pub mod tools;
pub mod xpander;

// Re-exports for convenience
pub use agent::coder::CoderAgent;
pub use agent::state::{LauncherState, StateManager};
pub use cli::config::{AwsIdentity, Config, ConfigError};
pub use llm::bedrock::BedrockClient;
pub use llm::ModelClient;
pub use server::http::AppState;
pub use tools::{LocalTool, Sandbox, ToolRegistry};
pub use xpander::agent::AgentHandle;
pub use xpander::client::XpanderClient;
pub use xpander::types::{ExecutionRequest, ExecutionResult, ExecutionStatus};
