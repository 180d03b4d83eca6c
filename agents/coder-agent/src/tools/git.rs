//! Git Tools
//!
//! Clone, status, and commit-and-push operations run inside a thread's
//! sandbox by shelling out to `git`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::tools::{optional_str, required_str, LocalTool, ToolContext};

/// Clone timeout. Large repositories over slow links abort rather than
/// hang the agent loop.
const CLONE_TIMEOUT_SECS: u64 = 120;

const GIT_TIMEOUT_SECS: u64 = 60;

/// Identity used for commits made by the agent.
const COMMIT_USER_NAME: &str = "Coder Agent";
const COMMIT_USER_EMAIL: &str = "agent@xpander.ai";

struct GitOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

async fn run_git(cwd: &Path, args: &[&str], timeout_secs: u64) -> Result<GitOutput> {
    debug!(cwd = %cwd.display(), ?args, "Running git");

    let output = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        Command::new("git").args(args).current_dir(cwd).output(),
    )
    .await;

    let output = match output {
        Ok(result) => result.context("Failed to spawn git")?,
        Err(_) => bail!("git {} timed out after {}s", args.join(" "), timeout_secs),
    };

    Ok(GitOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

async fn git_checked(cwd: &Path, args: &[&str], what: &str) -> Result<GitOutput> {
    let out = run_git(cwd, args, GIT_TIMEOUT_SECS).await?;
    if out.exit_code != 0 {
        bail!("{} failed: {}", what, out.stderr.trim());
    }
    Ok(out)
}

/// Clone a repository into the sandbox root, clearing it first.
pub async fn clone_into(
    cwd: &Path,
    repo_url: &str,
    branch: Option<&str>,
) -> Result<String> {
    let mut args = vec!["clone", repo_url, "."];
    if let Some(branch) = branch {
        args.extend(["--branch", branch, "--single-branch"]);
    }

    let out = run_git(cwd, &args, CLONE_TIMEOUT_SECS).await?;
    if out.exit_code != 0 {
        bail!("git clone failed: {}", out.stderr.trim());
    }

    info!(repo_url = %repo_url, "Repository cloned");

    // git reports clone progress on stderr, not stdout.
    let detail = out.stderr.trim();
    if detail.is_empty() {
        Ok(format!("Cloned {}", repo_url))
    } else {
        Ok(detail.to_string())
    }
}

/// Commit all changes on a new branch and push it to origin.
///
/// Returns the abbreviated commit output from git.
pub async fn commit_and_push(cwd: &Path, message: &str, branch_name: &str) -> Result<String> {
    git_checked(cwd, &["config", "user.name", COMMIT_USER_NAME], "git config").await?;
    git_checked(cwd, &["config", "user.email", COMMIT_USER_EMAIL], "git config").await?;
    git_checked(cwd, &["checkout", "-b", branch_name], "branch creation").await?;
    git_checked(cwd, &["add", "."], "git add").await?;
    let commit = git_checked(cwd, &["commit", "-m", message], "git commit").await?;
    git_checked(cwd, &["push", "origin", branch_name], "git push").await?;

    info!(branch = %branch_name, "Changes committed and pushed");
    Ok(commit.stdout.trim().to_string())
}

/// `git status` output for the sandbox repository.
pub async fn status(cwd: &Path) -> Result<String> {
    let out = git_checked(cwd, &["status"], "git status").await?;
    Ok(out.stdout)
}

/// `git_clone` tool: clone a repository into a fresh sandbox.
pub struct GitCloneTool;

#[async_trait]
impl LocalTool for GitCloneTool {
    fn name(&self) -> &'static str {
        "git_clone"
    }

    fn description(&self) -> &'static str {
        "Clone a git repository into the sandbox, replacing its current contents"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "repo_url": {
                    "type": "string",
                    "description": "URL of the repository to clone"
                },
                "branch": {
                    "type": "string",
                    "description": "Branch to check out (default branch if omitted)"
                }
            },
            "required": ["repo_url"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let repo_url = required_str(&input, "repo_url")?;
        let branch = optional_str(&input, "branch")?;

        // Fresh checkout per clone.
        ctx.sandbox.clear(ctx.thread_id)?;
        let cwd = ctx.sandbox.workspace(ctx.thread_id)?;

        let message = clone_into(&cwd, repo_url, branch).await?;
        Ok(json!({
            "message": message,
            "directory": cwd.display().to_string(),
        }))
    }
}

/// `commit_and_push` tool: commit sandbox changes to a new branch.
pub struct CommitAndPushTool;

#[async_trait]
impl LocalTool for CommitAndPushTool {
    fn name(&self) -> &'static str {
        "commit_and_push"
    }

    fn description(&self) -> &'static str {
        "Commit all sandbox changes on a new branch and push it to origin"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                },
                "branch_name": {
                    "type": "string",
                    "description": "Name of the branch to create and push"
                }
            },
            "required": ["message", "branch_name"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let message = required_str(&input, "message")?;
        let branch_name = required_str(&input, "branch_name")?;

        let cwd = ctx.sandbox.workspace(ctx.thread_id)?;
        let commit = commit_and_push(&cwd, message, branch_name).await?;

        Ok(json!({ "commit": commit, "branch": branch_name }))
    }
}

/// `git_status` tool: report the sandbox repository status.
pub struct GitStatusTool;

#[async_trait]
impl LocalTool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }

    fn description(&self) -> &'static str {
        "Show the git status of the sandbox repository"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, _input: Value) -> Result<Value> {
        let cwd = ctx.sandbox.workspace(ctx.thread_id)?;
        let output = status(&cwd).await?;
        Ok(json!({ "status": output }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_in_fresh_repo() {
        let dir = TempDir::new().unwrap();
        git_checked(dir.path(), &["init"], "git init").await.unwrap();

        let output = status(dir.path()).await.unwrap();
        assert!(output.contains("No commits yet") || output.contains("Initial commit"));
    }

    #[tokio::test]
    async fn test_status_outside_repo_fails() {
        let dir = TempDir::new().unwrap();
        let err = status(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("git status failed"));
    }

    #[tokio::test]
    async fn test_clone_local_repository() {
        let source = TempDir::new().unwrap();
        git_checked(source.path(), &["init"], "git init").await.unwrap();
        git_checked(
            source.path(),
            &["config", "user.email", COMMIT_USER_EMAIL],
            "git config",
        )
        .await
        .unwrap();
        git_checked(
            source.path(),
            &["config", "user.name", COMMIT_USER_NAME],
            "git config",
        )
        .await
        .unwrap();
        std::fs::write(source.path().join("file.txt"), "content").unwrap();
        git_checked(source.path(), &["add", "."], "git add").await.unwrap();
        git_checked(source.path(), &["commit", "-m", "init"], "git commit")
            .await
            .unwrap();

        let target = TempDir::new().unwrap();
        let url = source.path().to_string_lossy().into_owned();
        let message = clone_into(target.path(), &url, None).await.unwrap();

        assert!(target.path().join("file.txt").exists());
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn test_clone_tool_reports_message_and_directory() {
        let source = TempDir::new().unwrap();
        git_checked(source.path(), &["init"], "git init").await.unwrap();
        git_checked(
            source.path(),
            &["config", "user.email", COMMIT_USER_EMAIL],
            "git config",
        )
        .await
        .unwrap();
        git_checked(
            source.path(),
            &["config", "user.name", COMMIT_USER_NAME],
            "git config",
        )
        .await
        .unwrap();
        std::fs::write(source.path().join("file.txt"), "content").unwrap();
        git_checked(source.path(), &["add", "."], "git add").await.unwrap();
        git_checked(source.path(), &["commit", "-m", "init"], "git commit")
            .await
            .unwrap();

        let base = TempDir::new().unwrap();
        let sandbox = crate::tools::Sandbox::new(base.path().join("sandboxes")).unwrap();
        let ctx = ToolContext {
            sandbox: &sandbox,
            thread_id: "t",
        };

        let url = source.path().to_string_lossy().into_owned();
        let out = GitCloneTool
            .invoke(&ctx, json!({ "repo_url": url }))
            .await
            .unwrap();

        assert!(!out["message"].as_str().unwrap().is_empty());
        let workspace = sandbox.workspace("t").unwrap();
        assert_eq!(out["directory"], workspace.display().to_string());
        assert!(workspace.join("file.txt").exists());
    }
}
