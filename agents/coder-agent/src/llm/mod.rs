//! LLM module
//!
//! Amazon Bedrock integration for the agent loop, behind a small trait
//! so the loop can be driven by a scripted model in tests.

pub mod bedrock;

use anyhow::Result;
use async_trait::async_trait;

use crate::xpander::types::{ChatMessage, ToolChoice, ToolSpec};
use bedrock::TurnOutput;

/// A conversational model that can drive the agent loop.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn converse(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        tool_choice: ToolChoice,
    ) -> Result<TurnOutput>;
}

#[async_trait]
impl ModelClient for bedrock::BedrockClient {
    async fn converse(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        tool_choice: ToolChoice,
    ) -> Result<TurnOutput> {
        bedrock::BedrockClient::converse(self, system, messages, tools, tool_choice).await
    }
}
