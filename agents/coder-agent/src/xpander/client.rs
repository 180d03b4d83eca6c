//! xpander Control Plane Client
//!
//! HTTP client for the xpander.ai API: agent lookup and creation,
//! instruction updates, remote operation invocation, and execution
//! result reporting.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::xpander::types::{AgentDescriptor, ExecutionResult, Instructions};

/// Default control plane endpoint, overridable via `XPANDER_BASE_URL`.
pub const DEFAULT_BASE_URL: &str = "https://inbound.xpander.ai";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Client for the xpander control plane API.
#[derive(Debug, Clone)]
pub struct XpanderClient {
    client: reqwest::Client,
    base_url: String,
}

impl XpanderClient {
    /// Create a client authenticated with the given API key.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).context("XPANDER_API_KEY contains invalid characters")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch an agent by id.
    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentDescriptor> {
        self.get(&format!("/agents/{}", agent_id))
            .await
            .with_context(|| format!("Failed to load agent {}", agent_id))
    }

    /// Create a new agent with the given name.
    pub async fn create_agent(&self, name: &str) -> Result<AgentDescriptor> {
        self.post(
            "/agents",
            &serde_json::json!({ "name": name }),
        )
        .await
        .with_context(|| format!("Failed to create agent '{}'", name))
    }

    /// Replace the agent's instructions on the control plane.
    pub async fn update_instructions(
        &self,
        agent_id: &str,
        instructions: &Instructions,
    ) -> Result<()> {
        let _: Value = self
            .patch(&format!("/agents/{}/instructions", agent_id), instructions)
            .await
            .with_context(|| format!("Failed to update instructions for agent {}", agent_id))?;
        Ok(())
    }

    /// Invoke a remote operation attached to the agent.
    pub async fn invoke_operation(
        &self,
        agent_id: &str,
        operation: &str,
        input: &Value,
    ) -> Result<Value> {
        debug!(agent_id = %agent_id, operation = %operation, "Invoking remote operation");
        self.post(
            &format!("/agents/{}/operations/{}/invoke", agent_id, operation),
            input,
        )
        .await
        .with_context(|| format!("Remote operation '{}' failed", operation))
    }

    /// Report the outcome of an execution back to the control plane.
    pub async fn report_result(&self, agent_id: &str, result: &ExecutionResult) -> Result<()> {
        let _: Value = self
            .post(
                &format!(
                    "/agents/{}/executions/{}/result",
                    agent_id, result.execution_id
                ),
                result,
            )
            .await
            .with_context(|| {
                format!("Failed to report result for execution {}", result.execution_id)
            })?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/v1{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        Self::unwrap_envelope(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}/v1{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        Self::unwrap_envelope(response).await
    }

    async fn patch<T: DeserializeOwned, B: serde::Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}/v1{}", self.base_url, path);
        let response = self
            .client
            .patch(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Invalid API response (status {})", status))?;

        if !body.success {
            if let Some(err) = body.error {
                bail!("[{}] {}", err.code, err.message);
            }
            bail!("API request failed with status {}", status);
        }

        body.data.context("Empty response from API")
    }
}
