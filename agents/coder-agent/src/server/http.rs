//! Execution Listener
//!
//! The local HTTP surface of the launcher: liveness, status, and the
//! execution webhook that runs agent tasks to completion.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::agent::coder::CoderAgent;
use crate::agent::state::StateManager;
use crate::llm::ModelClient;
use crate::xpander::types::{ExecutionRequest, ExecutionResult};

/// Shared state behind the listener.
pub struct AppState<M: ModelClient + 'static> {
    pub coder: CoderAgent<M>,
    pub lifecycle: StateManager,
}

/// Build the listener router.
pub fn router<M: ModelClient + 'static>(state: Arc<AppState<M>>) -> Router {
    Router::new()
        .route("/health", get(health::<M>))
        .route("/status", get(status::<M>))
        .route("/v1/executions", post(execute::<M>))
        .with_state(state)
}

/// Bind the listener socket. Fails fast when the port is taken.
pub async fn bind(addr: IpAddr, port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from((addr, port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {} (port already in use?)", addr))
}

/// Serve requests on an already-bound listener until terminated.
pub async fn run<M: ModelClient + 'static>(
    listener: TcpListener,
    state: Arc<AppState<M>>,
) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    state.lifecycle.set_serving();
    info!(addr = %addr, "Execution listener serving");

    axum::serve(listener, router(state.clone()))
        .await
        .context("HTTP server error")?;

    state.lifecycle.set_stopped(Some("Listener closed".to_string()));
    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    agent_id: String,
}

async fn health<M: ModelClient>(State(state): State<Arc<AppState<M>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent_id: state.coder.agent_id().to_string(),
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    state: String,
    uptime_secs: u64,
    threads: usize,
    hostname: String,
    version: &'static str,
}

async fn status<M: ModelClient>(State(state): State<Arc<AppState<M>>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.lifecycle.current_state().to_string(),
        uptime_secs: state.lifecycle.uptime_secs(),
        threads: state.coder.thread_count(),
        hostname: hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn execute<M: ModelClient>(
    State(state): State<Arc<AppState<M>>>,
    Json(request): Json<ExecutionRequest>,
) -> Json<ExecutionResult> {
    info!(execution_id = %request.execution_id, "Received execution request");
    Json(state.coder.run_task(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::bedrock::{StopKind, TurnOutput};
    use crate::tools::{Sandbox, ToolRegistry};
    use crate::xpander::agent::AgentHandle;
    use crate::xpander::client::XpanderClient;
    use crate::xpander::types::{
        AgentDescriptor, ChatMessage, ContentItem, Instructions, Role, ToolChoice, ToolSpec,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Model that always answers with the same text.
    struct EchoModel;

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn converse(
            &self,
            _system: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
            _tool_choice: ToolChoice,
        ) -> anyhow::Result<TurnOutput> {
            Ok(TurnOutput {
                message: ChatMessage {
                    role: Role::Assistant,
                    content: vec![ContentItem::Text {
                        text: "done".to_string(),
                    }],
                },
                stop_reason: StopKind::EndTurn,
            })
        }
    }

    fn app_state(dir: &TempDir) -> Arc<AppState<EchoModel>> {
        let descriptor = AgentDescriptor {
            id: "agent-http".to_string(),
            organization_id: "org".to_string(),
            name: "Coder Agent".to_string(),
            instructions: Instructions::default(),
            tool_choice: ToolChoice::Auto,
            tools: vec![],
        };
        let client = XpanderClient::new("test-key", "http://127.0.0.1:1").unwrap();
        let handle = AgentHandle::from_parts(client, descriptor);
        let sandbox = Sandbox::new(dir.path().join("sandboxes")).unwrap();

        Arc::new(AppState {
            coder: CoderAgent::new(handle, EchoModel, ToolRegistry::standard(sandbox)),
            lifecycle: StateManager::new(),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = router(app_state(&dir));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["agent_id"], "agent-http");
    }

    #[tokio::test]
    async fn test_status_reports_lifecycle() {
        let dir = TempDir::new().unwrap();
        let state = app_state(&dir);
        state.lifecycle.set_serving();
        let app = router(state);

        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["state"], "serving");
        assert_eq!(body["threads"], 0);
    }

    #[tokio::test]
    async fn test_execution_endpoint_runs_task() {
        let dir = TempDir::new().unwrap();
        let app = router(app_state(&dir));

        let request = Request::builder()
            .method("POST")
            .uri("/v1/executions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"input": "hello"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"], "done");
        assert!(!body["thread_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execution_rejects_malformed_body() {
        let dir = TempDir::new().unwrap();
        let app = router(app_state(&dir));

        let request = Request::builder()
            .method("POST")
            .uri("/v1/executions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"no_input": true}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_bind_conflict_fails_fast() {
        let loopback = IpAddr::from([127, 0, 0, 1]);
        let first = bind(loopback, 0).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let err = bind(loopback, port).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[tokio::test]
    async fn test_bind_honors_address() {
        let all = IpAddr::from([0, 0, 0, 0]);
        let listener = bind(all, 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_unspecified());
    }
}
