//! Bedrock Client
//!
//! Wraps the Amazon Bedrock Converse API: credential resolution from
//! the launcher configuration, conversion between the internal chat
//! model and SDK types, and a single-turn `converse` call.

use anyhow::{anyhow, Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::types::{
    AnyToolChoice, AutoToolChoice, ContentBlock, ConversationRole, Message, StopReason,
    SystemContentBlock, Tool, ToolChoice as SdkToolChoice, ToolConfiguration,
    ToolInputSchema, ToolResultBlock, ToolResultContentBlock, ToolResultStatus,
    ToolSpecification, ToolUseBlock,
};
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::{Document, Number};
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::config::{AwsIdentity, Config};
use crate::xpander::types::{ChatMessage, ContentItem, Role, ToolChoice, ToolSpec};

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

/// One model turn: the assistant message and the stop reason.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub message: ChatMessage,
    pub stop_reason: StopKind,
}

/// Client for the Bedrock Converse API.
pub struct BedrockClient {
    client: Client,
    model_id: String,
}

impl BedrockClient {
    /// Build a Bedrock client from the launcher configuration.
    ///
    /// A named profile takes precedence; otherwise the static key pair
    /// from the environment is used.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()));

        match &config.aws {
            AwsIdentity::Profile(profile) => {
                info!(profile = %profile, "Using AWS profile");
                loader = loader.profile_name(profile);
            }
            AwsIdentity::StaticKeys {
                access_key_id,
                secret_access_key,
            } => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    None,
                    None,
                    "coder_agent_static",
                ));
            }
        }

        let shared = loader.load().await;
        info!(model_id = %config.model_id, region = %config.aws_region, "Bedrock client ready");

        Ok(Self {
            client: Client::new(&shared),
            model_id: config.model_id.clone(),
        })
    }

    /// Run one Converse turn over the thread transcript.
    pub async fn converse(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        tool_choice: ToolChoice,
    ) -> Result<TurnOutput> {
        let mut request = self.client.converse().model_id(&self.model_id);

        if !system.is_empty() {
            request = request.system(SystemContentBlock::Text(system.to_string()));
        }

        for message in messages {
            request = request.messages(to_sdk_message(message)?);
        }

        if !tools.is_empty() {
            request = request.tool_config(build_tool_config(tools, tool_choice)?);
        }

        debug!(messages = messages.len(), tools = tools.len(), "Sending converse request");
        let response = request
            .send()
            .await
            .context("Bedrock converse request failed")?;

        let stop_reason = map_stop_reason(response.stop_reason());
        let output = response
            .output()
            .context("Bedrock response missing output")?;
        let message = output
            .as_message()
            .map_err(|_| anyhow!("Unexpected Bedrock output variant"))?;

        Ok(TurnOutput {
            message: from_sdk_message(message),
            stop_reason,
        })
    }
}

fn map_stop_reason(reason: &StopReason) -> StopKind {
    match reason {
        StopReason::EndTurn => StopKind::EndTurn,
        StopReason::ToolUse => StopKind::ToolUse,
        StopReason::MaxTokens => StopKind::MaxTokens,
        _ => StopKind::Other,
    }
}

fn to_sdk_message(message: &ChatMessage) -> Result<Message> {
    let role = match message.role {
        Role::User => ConversationRole::User,
        Role::Assistant => ConversationRole::Assistant,
    };

    let mut builder = Message::builder().role(role);
    for item in &message.content {
        let block = match item {
            ContentItem::Text { text } => ContentBlock::Text(text.clone()),
            ContentItem::ToolUse { id, name, input } => ContentBlock::ToolUse(
                ToolUseBlock::builder()
                    .tool_use_id(id)
                    .name(name)
                    .input(json_to_document(input))
                    .build()
                    .context("Failed to build tool use block")?,
            ),
            ContentItem::ToolResult {
                id,
                success,
                payload,
            } => ContentBlock::ToolResult(
                ToolResultBlock::builder()
                    .tool_use_id(id)
                    .content(ToolResultContentBlock::Json(json_to_document(payload)))
                    .status(if *success {
                        ToolResultStatus::Success
                    } else {
                        ToolResultStatus::Error
                    })
                    .build()
                    .context("Failed to build tool result block")?,
            ),
        };
        builder = builder.content(block);
    }

    builder.build().context("Failed to build Bedrock message")
}

fn from_sdk_message(message: &Message) -> ChatMessage {
    let role = match message.role() {
        ConversationRole::Assistant => Role::Assistant,
        _ => Role::User,
    };

    let mut content = Vec::new();
    for block in message.content() {
        match block {
            ContentBlock::Text(text) => content.push(ContentItem::Text { text: text.clone() }),
            ContentBlock::ToolUse(tool_use) => content.push(ContentItem::ToolUse {
                id: tool_use.tool_use_id().to_string(),
                name: tool_use.name().to_string(),
                input: document_to_json(tool_use.input()),
            }),
            // Reasoning, images, and documents are not part of the
            // coder loop; drop them rather than fail the turn.
            _ => {}
        }
    }

    ChatMessage { role, content }
}

fn build_tool_config(tools: &[ToolSpec], choice: ToolChoice) -> Result<ToolConfiguration> {
    let mut builder = ToolConfiguration::builder();

    for spec in tools {
        let mut tool = ToolSpecification::builder()
            .name(&spec.name)
            .input_schema(ToolInputSchema::Json(json_to_document(&spec.input_schema)));
        if !spec.description.is_empty() {
            tool = tool.description(&spec.description);
        }
        builder = builder.tools(Tool::ToolSpec(
            tool.build()
                .with_context(|| format!("Invalid tool spec: {}", spec.name))?,
        ));
    }

    let sdk_choice = match choice {
        ToolChoice::Auto => SdkToolChoice::Auto(AutoToolChoice::builder().build()),
        ToolChoice::Required => SdkToolChoice::Any(AnyToolChoice::builder().build()),
    };

    builder
        .tool_choice(sdk_choice)
        .build()
        .context("Failed to build tool configuration")
}

fn json_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                Document::Number(Number::Float(n.as_f64().unwrap_or(0.0)))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_document(v)))
                .collect(),
        ),
    }
}

fn document_to_json(document: &Document) -> Value {
    match document {
        Document::Null => Value::Null,
        Document::Bool(b) => Value::Bool(*b),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Document::String(s) => Value::String(s.clone()),
        Document::Array(items) => Value::Array(items.iter().map(document_to_json).collect()),
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_json(v)))
                .collect(),
        ),
    }
}
