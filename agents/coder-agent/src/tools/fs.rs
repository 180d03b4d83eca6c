//! File Tools
//!
//! Read, write, and listing operations scoped to a thread's sandbox.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

use crate::tools::{optional_str, required_str, LocalTool, ToolContext};

/// One entry in a sandbox listing.
#[derive(Debug, Clone, Serialize)]
pub struct FileNode {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: &'static str,

    /// Path relative to the sandbox root.
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// Build a sorted tree of the sandbox contents.
pub fn describe_tree(root: &Path) -> Result<Vec<FileNode>> {
    build_tree(root, "")
}

fn build_tree(dir: &Path, rel: &str) -> Result<Vec<FileNode>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut nodes = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel_path = if rel.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", rel, name)
        };

        let meta = entry.metadata()?;
        if meta.is_dir() {
            nodes.push(FileNode {
                name,
                kind: "directory",
                path: rel_path.clone(),
                size: None,
                children: Some(build_tree(&entry.path(), &rel_path)?),
            });
        } else {
            nodes.push(FileNode {
                name,
                kind: "file",
                path: rel_path,
                size: Some(meta.len()),
                children: None,
            });
        }
    }
    Ok(nodes)
}

/// `read_file` tool: read a file from the sandbox.
pub struct ReadFileTool;

#[async_trait]
impl LocalTool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file in the sandbox"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the sandbox root"
                }
            },
            "required": ["path"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let path = required_str(&input, "path")?;
        let full = ctx.sandbox.resolve(ctx.thread_id, path)?;

        if !full.is_file() {
            bail!("file not found: {}", path);
        }

        let content = tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("Failed to read {}", path))?;

        Ok(json!({ "path": path, "content": content }))
    }
}

/// `write_file` tool: create or overwrite a file in the sandbox.
pub struct WriteFileTool;

#[async_trait]
impl LocalTool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file in the sandbox with the given content"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the sandbox root"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let path = required_str(&input, "path")?;
        let content = required_str(&input, "content")?;

        let full = ctx.sandbox.resolve(ctx.thread_id, path)?;
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("Failed to write {}", path))?;

        Ok(json!({ "path": path, "bytes_written": content.len() }))
    }
}

/// `describe_tree` tool: list the sandbox contents as a tree.
pub struct DescribeTreeTool;

#[async_trait]
impl LocalTool for DescribeTreeTool {
    fn name(&self) -> &'static str {
        "describe_tree"
    }

    fn description(&self) -> &'static str {
        "Return a tree listing of the sandbox contents with file sizes"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Subdirectory to list (default: sandbox root)"
                }
            }
        })
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
        let sub = optional_str(&input, "path")?.unwrap_or("");
        let root = ctx.sandbox.resolve(ctx.thread_id, sub)?;

        if !root.is_dir() {
            bail!("not a directory: {}", sub);
        }

        let tree = describe_tree(&root)?;
        Ok(json!({ "tree": tree }))
    }
}
