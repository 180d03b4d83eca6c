//! Coder Agent Loop
//!
//! Drives one execution: seed the thread with the user input, then
//! alternate model turns and tool rounds until the model stops asking
//! for tools or the step cap is hit.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::agent::threads::ThreadStore;
use crate::llm::bedrock::StopKind;
use crate::llm::ModelClient;
use crate::tools::ToolRegistry;
use crate::xpander::agent::AgentHandle;
use crate::xpander::types::{
    ChatMessage, ExecutionRequest, ExecutionResult, ExecutionStatus, ToolCall, ToolChoice,
    ToolOutput,
};

/// Upper bound on model turns per execution.
pub const MAX_STEPS: usize = 24;

/// The agent runtime: remote identity, model, tools, and thread memory.
pub struct CoderAgent<M: ModelClient> {
    handle: AgentHandle,
    model: M,
    tools: ToolRegistry,
    threads: ThreadStore,
}

impl<M: ModelClient> CoderAgent<M> {
    pub fn new(handle: AgentHandle, model: M, tools: ToolRegistry) -> Self {
        Self {
            handle,
            model,
            tools,
            threads: ThreadStore::new(),
        }
    }

    pub fn agent_id(&self) -> &str {
        self.handle.id()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Run a chat turn: new thread when `thread_id` is `None`.
    pub async fn chat(&self, input: &str, thread_id: Option<&str>) -> ExecutionResult {
        let request = match thread_id {
            Some(thread_id) => {
                info!(thread_id = %thread_id, "Adding task to existing thread");
                ExecutionRequest::on_thread(input, thread_id)
            }
            None => {
                info!("Adding task to a new thread");
                ExecutionRequest::new(input)
            }
        };
        self.run_task(request).await
    }

    /// Run an execution to completion and report the outcome upstream.
    pub async fn run_task(&self, request: ExecutionRequest) -> ExecutionResult {
        info!(execution_id = %request.execution_id, "Starting agent loop");

        let (thread_id, thread) = self.threads.open(request.thread_id.as_deref());
        // The guard serializes concurrent executions on one thread.
        let mut thread = thread.lock().await;
        thread.messages.push(ChatMessage::user_text(&request.input));

        let mut tool_specs = self.tools.specs();
        tool_specs.extend(self.handle.remote_tools().iter().cloned());
        let system = self.handle.system_prompt();

        let mut step = 1;
        let (status, result_text) = loop {
            debug!(step, thread_id = %thread_id, "Agent step");

            // The agent's configured tool choice applies to the first
            // turn only; forcing tools on every turn would never let
            // the model finish.
            let choice = if step == 1 {
                self.handle.tool_choice()
            } else {
                ToolChoice::Auto
            };

            let turn = match self
                .model
                .converse(&system, &thread.messages, &tool_specs, choice)
                .await
            {
                Ok(turn) => turn,
                Err(e) => {
                    error!(error = %e, "Model turn failed");
                    break (ExecutionStatus::Failed, format!("model error: {:#}", e));
                }
            };

            let calls = turn.message.tool_calls();
            let text = turn.message.text();
            thread.messages.push(turn.message);

            if turn.stop_reason == StopKind::MaxTokens {
                warn!(thread_id = %thread_id, "Model hit its token limit mid-response");
                break (
                    ExecutionStatus::Failed,
                    format!("response truncated at the model token limit: {}", text),
                );
            }

            if calls.is_empty() || turn.stop_reason != StopKind::ToolUse {
                break (ExecutionStatus::Completed, text);
            }

            info!(
                tools = %calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(" | "),
                "Executing tools selected by the model"
            );
            let outputs = self.run_tools(&thread_id, &calls).await;
            thread.messages.push(ChatMessage::tool_results(&outputs));

            step += 1;
            if step > MAX_STEPS {
                warn!(thread_id = %thread_id, "Execution exceeded step limit");
                break (
                    ExecutionStatus::Failed,
                    format!("execution exceeded {} steps", MAX_STEPS),
                );
            }
        };

        let result = ExecutionResult {
            execution_id: request.execution_id,
            thread_id: thread_id.clone(),
            status,
            result: result_text,
            timestamp: Utc::now(),
        };

        // Reporting is best effort; the caller still gets the result.
        if let Err(e) = self.handle.report_result(&result).await {
            warn!(error = %e, "Failed to report execution result");
        }

        info!(
            thread_id = %thread_id,
            status = %result.status,
            "Agent loop finished"
        );
        result
    }

    async fn run_tools(&self, thread_id: &str, calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let output = if self.tools.contains(&call.name) {
                self.tools.dispatch(thread_id, call).await
            } else if self.handle.has_remote_tool(&call.name) {
                match self.handle.invoke_remote(call).await {
                    Ok(payload) => ToolOutput::ok(call, payload),
                    Err(e) => ToolOutput::error(call, format!("{:#}", e)),
                }
            } else {
                ToolOutput::error(call, format!("unknown tool: {}", call.name))
            };

            info!(tool = %call.name, success = output.success, "Tool finished");
            outputs.push(output);
        }
        outputs
    }
}
