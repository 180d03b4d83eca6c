//! Command Execution Tool
//!
//! Runs shell commands inside a thread's sandbox with a timeout and
//! bounded output.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::tools::{optional_u64, required_str, LocalTool, ToolContext};

/// Output cap per stream. Keeps a runaway command from exhausting memory.
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Truncate a string to `max_bytes`, preserving UTF-8 boundaries.
fn truncate_output(s: String, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_string();
    truncated.push_str("\n... [output truncated]");
    truncated
}

/// Result of a completed command.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a shell command via `sh -c` in `cwd`, bounded by `timeout_secs`.
pub async fn run_shell(cwd: &Path, cmd: &str, timeout_secs: u64) -> Result<ExecOutcome> {
    debug!(cwd = %cwd.display(), cmd = %cmd, "Executing shell command");

    let output = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        Command::new("sh")
            .args(["-c", cmd])
            .current_dir(cwd)
            .output(),
    )
    .await;

    let output = match output {
        Ok(result) => result.with_context(|| format!("Failed to spawn: {}", cmd))?,
        Err(_) => bail!("command timed out after {}s: {}", timeout_secs, cmd),
    };

    let outcome = ExecOutcome {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: truncate_output(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            MAX_OUTPUT_SIZE,
        ),
        stderr: truncate_output(
            String::from_utf8_lossy(&output.stderr).into_owned(),
            MAX_OUTPUT_SIZE,
        ),
    };

    debug!(
        exit_code = outcome.exit_code,
        stdout_len = outcome.stdout.len(),
        stderr_len = outcome.stderr.len(),
        "Command completed"
    );

    Ok(outcome)
}

/// `execute_command` tool: run a shell command in the sandbox.
pub struct ExecuteCommandTool;

#[async_trait]
impl LocalTool for ExecuteCommandTool {
    fn name(&self) -> &'static str {
        "execute_command"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command inside the sandbox and return its exit code and output"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 120)"
                }
            },
            "required": ["command"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let command = required_str(&input, "command")?;
        let timeout_secs = optional_u64(&input, "timeout_secs")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let cwd = ctx.sandbox.workspace(ctx.thread_id)?;
        let outcome = run_shell(&cwd, command, timeout_secs).await?;

        Ok(json!({
            "success": outcome.success(),
            "exit_code": outcome.exit_code,
            "stdout": outcome.stdout,
            "stderr": outcome.stderr,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_shell_echo() {
        let dir = TempDir::new().unwrap();
        let outcome = run_shell(dir.path(), "echo hello", 10).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout.trim(), "hello");
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_run_shell_exit_code() {
        let dir = TempDir::new().unwrap();
        let outcome = run_shell(dir.path(), "exit 3", 10).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_run_shell_timeout() {
        let dir = TempDir::new().unwrap();
        let err = run_shell(dir.path(), "sleep 5", 1).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_run_shell_uses_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let outcome = run_shell(dir.path(), "ls", 10).await.unwrap();
        assert!(outcome.stdout.contains("marker.txt"));
    }

    #[test]
    fn test_truncate_output_respects_utf8() {
        let s = "é".repeat(100);
        let truncated = truncate_output(s, 101);
        assert!(truncated.ends_with("[output truncated]"));
        // Must not split the two-byte 'é' in half.
        assert!(truncated.starts_with(&"é".repeat(50)));
    }

    #[test]
    fn test_truncate_output_noop_under_limit() {
        let s = "short".to_string();
        assert_eq!(truncate_output(s.clone(), 100), s);
    }
}
