// src/workspace.rs

//! Per-job workspace lifecycle.
//!
//! Each dispatched job gets a fresh temporary directory that it exclusively
//! owns while running. Dependencies' artifacts are copied into an `input/`
//! area inside the workspace *before* the job's first command runs. A
//! workspace is retained after its job succeeds until every dependent has
//! consumed the artifact (goal workspaces live until the report is
//! finalized), then released.
//!
//! Cleanup is scoped: workspaces are backed by [`tempfile::TempDir`], whose
//! `Drop` removes the directory on every exit path, so even a run that dies
//! with a fatal error leaves nothing behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::errors::Result;

/// Name of the directory inside a workspace where dependency artifacts are
/// staged. Excluded from artifact discovery after the job finishes.
pub const INPUT_DIR: &str = "input";

/// Owns the temporary directories of all jobs in a run.
#[derive(Debug, Default)]
pub struct WorkspaceManager {
    dirs: HashMap<String, TempDir>,
}

impl WorkspaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, empty workspace for a job and return its path.
    pub fn acquire(&mut self, name: &str) -> Result<PathBuf> {
        let dir = TempDir::with_prefix(format!("dagforge-{name}-"))?;
        let path = dir.path().to_path_buf();
        debug!(job = %name, path = %path.display(), "workspace acquired");
        self.dirs.insert(name.to_string(), dir);
        Ok(path)
    }

    /// Path of a job's workspace, if it is still held.
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.dirs.get(name).map(|d| d.path())
    }

    /// Stage dependency artifacts into the job's `input/` area.
    ///
    /// Each artifact is copied as `input/<dep-name>`, giving the job a
    /// deterministic filename regardless of what the dependency called its
    /// output. Must be called before the job is dispatched.
    pub fn stage_inputs(&self, name: &str, deps: &[(String, PathBuf)]) -> Result<()> {
        if deps.is_empty() {
            return Ok(());
        }

        let Some(workspace) = self.path(name) else {
            return Err(anyhow::anyhow!("no workspace held for job '{name}'").into());
        };

        let input_dir = workspace.join(INPUT_DIR);
        fs::create_dir_all(&input_dir)?;

        for (dep, artifact) in deps {
            let dest = input_dir.join(dep);
            fs::copy(artifact, &dest)?;
            debug!(
                job = %name,
                dep = %dep,
                artifact = %artifact.display(),
                "staged dependency artifact"
            );
        }

        Ok(())
    }

    /// Delete a job's workspace and all contents.
    ///
    /// Idempotent: releasing an already-released (or never-acquired) job is a
    /// no-op.
    pub fn release(&mut self, name: &str) {
        if let Some(dir) = self.dirs.remove(name) {
            debug!(job = %name, "releasing workspace");
            if let Err(e) = dir.close() {
                // Drop already made a best-effort removal; just log.
                warn!(job = %name, error = %e, "failed to remove workspace directory");
            }
        }
    }

    /// Release every workspace still held.
    pub fn release_all(&mut self) {
        let names: Vec<String> = self.dirs.keys().cloned().collect();
        for name in names {
            self.release(&name);
        }
    }
}
