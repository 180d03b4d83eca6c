//! Sandbox Workspaces
//!
//! Per-thread scratch directories the local tools operate in. Paths
//! handed to tools are resolved relative to the thread's workspace and
//! may never escape it.

use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Manages per-thread sandbox directories under a common base.
pub struct Sandbox {
    base_dir: PathBuf,
    by_thread: DashMap<String, PathBuf>,
}

impl Sandbox {
    /// Create a sandbox manager rooted at `base_dir`, creating it if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create sandbox base {}", base_dir.display()))?;
        info!(base = %base_dir.display(), "Sandbox base directory ready");

        Ok(Self {
            base_dir,
            by_thread: DashMap::new(),
        })
    }

    /// Get or create the workspace directory for a thread.
    pub fn workspace(&self, thread_id: &str) -> Result<PathBuf> {
        if let Some(existing) = self.by_thread.get(thread_id) {
            if existing.exists() {
                return Ok(existing.clone());
            }
        }

        let suffix = &Uuid::new_v4().to_string()[..8];
        let path = self.base_dir.join(format!("sandbox_{}_{}", thread_id, suffix));

        if path.exists() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("Failed to reset sandbox {}", path.display()))?;
        }
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create sandbox {}", path.display()))?;

        info!(thread_id = %thread_id, path = %path.display(), "Created sandbox");
        self.by_thread.insert(thread_id.to_string(), path.clone());
        Ok(path)
    }

    /// Resolve a tool-supplied relative path inside the thread workspace.
    ///
    /// Absolute paths and parent-directory traversal are rejected. Parent
    /// directories of the resolved path are created so write targets are
    /// immediately usable.
    pub fn resolve(&self, thread_id: &str, filepath: &str) -> Result<PathBuf> {
        let root = self.workspace(thread_id)?;

        if filepath.trim().is_empty() {
            return Ok(root);
        }

        let candidate = Path::new(filepath);
        if candidate.is_absolute() {
            bail!("absolute paths are not allowed in the sandbox: {}", filepath);
        }
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            bail!("path escapes the sandbox: {}", filepath);
        }

        let full = root.join(candidate);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(full)
    }

    /// Remove all contents of a thread's workspace, keeping the directory.
    pub fn clear(&self, thread_id: &str) -> Result<()> {
        let root = self.workspace(thread_id)?;
        for entry in std::fs::read_dir(&root)
            .with_context(|| format!("Failed to list {}", root.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Number of active thread workspaces.
    pub fn thread_count(&self) -> usize {
        self.by_thread.len()
    }
}
