//! Agent Handle
//!
//! The launcher-owned binding to a remote agent identity, plus the local
//! state files (`xpander_config.json`, `agent_instructions.json`) kept in
//! sync with the control plane.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::xpander::client::XpanderClient;
use crate::xpander::types::{AgentDescriptor, Instructions, ToolCall, ToolChoice, ToolSpec};

const CONFIG_FILE: &str = "xpander_config.json";
const INSTRUCTIONS_FILE: &str = "agent_instructions.json";

/// Agent identity persisted across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedAgentConfig {
    #[serde(default)]
    pub agent_id: Option<String>,

    #[serde(default)]
    pub organization_id: Option<String>,
}

impl SavedAgentConfig {
    fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(CONFIG_FILE)
    }

    /// Load the saved identity, if the file exists.
    pub fn load(state_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(state_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let saved: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(saved))
    }

    /// Persist the identity to disk.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = Self::path(state_dir);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn load_local_instructions(state_dir: &Path) -> Result<Option<Instructions>> {
    let path = state_dir.join(INSTRUCTIONS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let instructions: Instructions = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(instructions))
}

fn save_local_instructions(state_dir: &Path, instructions: &Instructions) -> Result<()> {
    let path = state_dir.join(INSTRUCTIONS_FILE);
    let content = serde_json::to_string_pretty(instructions)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// The launcher's binding to a remote agent.
///
/// Owns the control-plane client and the agent descriptor; dropped when
/// the process exits.
pub struct AgentHandle {
    client: XpanderClient,
    descriptor: AgentDescriptor,
}

impl AgentHandle {
    /// Bind to an already-fetched descriptor without touching the
    /// control plane. Used by tests and by callers that manage
    /// synchronization themselves.
    pub fn from_parts(client: XpanderClient, descriptor: AgentDescriptor) -> Self {
        Self { client, descriptor }
    }

    /// Bind to an existing agent and synchronize instructions.
    ///
    /// Local `agent_instructions.json` wins over the remote copy; when no
    /// local file exists it is seeded from the remote agent, matching the
    /// original launcher behavior.
    pub async fn acquire(
        client: XpanderClient,
        agent_id: &str,
        state_dir: &Path,
    ) -> Result<Self> {
        info!(agent_id = %agent_id, "Loading existing agent");
        let mut descriptor = client.get_agent(agent_id).await?;

        match load_local_instructions(state_dir)? {
            Some(local) => {
                info!("Found local {}, updating remote agent", INSTRUCTIONS_FILE);
                client.update_instructions(&descriptor.id, &local).await?;
                descriptor.instructions = local;
            }
            None => {
                info!("No local {}, seeding from remote agent", INSTRUCTIONS_FILE);
                save_local_instructions(state_dir, &descriptor.instructions)?;
            }
        }

        let handle = Self { client, descriptor };
        handle.persist_identity(state_dir)?;
        Ok(handle)
    }

    /// Create a fresh agent on the control plane and bind to it.
    pub async fn create(client: XpanderClient, name: &str, state_dir: &Path) -> Result<Self> {
        info!(name = %name, "Creating new agent");
        let mut descriptor = client.create_agent(name).await?;

        match load_local_instructions(state_dir)? {
            Some(local) => {
                info!("Applying local instructions to new agent");
                client.update_instructions(&descriptor.id, &local).await?;
                descriptor.instructions = local;
            }
            None => {
                let defaults = default_instructions();
                client
                    .update_instructions(&descriptor.id, &defaults)
                    .await?;
                save_local_instructions(state_dir, &defaults)?;
                descriptor.instructions = defaults;
            }
        }

        let handle = Self { client, descriptor };
        handle.persist_identity(state_dir)?;
        Ok(handle)
    }

    fn persist_identity(&self, state_dir: &Path) -> Result<()> {
        SavedAgentConfig {
            agent_id: Some(self.descriptor.id.clone()),
            organization_id: Some(self.descriptor.organization_id.clone()),
        }
        .save(state_dir)
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn tool_choice(&self) -> ToolChoice {
        self.descriptor.tool_choice
    }

    /// Operations attached to the agent on the control plane.
    pub fn remote_tools(&self) -> &[ToolSpec] {
        &self.descriptor.tools
    }

    /// System prompt rendered from the agent's instructions.
    pub fn system_prompt(&self) -> String {
        self.descriptor.instructions.system_prompt()
    }

    /// Whether the named tool is a remote operation of this agent.
    pub fn has_remote_tool(&self, name: &str) -> bool {
        self.descriptor.tools.iter().any(|t| t.name == name)
    }

    /// Invoke a remote operation for a tool call.
    pub async fn invoke_remote(&self, call: &ToolCall) -> Result<Value> {
        self.client
            .invoke_operation(&self.descriptor.id, &call.name, &call.input)
            .await
    }

    /// Report an execution outcome to the control plane.
    pub async fn report_result(
        &self,
        result: &crate::xpander::types::ExecutionResult,
    ) -> Result<()> {
        self.client.report_result(&self.descriptor.id, result).await
    }
}

fn default_instructions() -> Instructions {
    Instructions {
        role: "Your role is not specific to any domain.".to_string(),
        goal: "Your goal is to help the user with their questions.".to_string(),
        general: "You are a helpful assistant.".to_string(),
    }
}
