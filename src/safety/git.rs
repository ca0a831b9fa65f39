//! Git-backed checkpoints of a working tree.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::checkpoint::{CheckpointId, CheckpointProvider};
use crate::error::{OrchestratorError, Result};

const STASH_PREFIX: &str = "stash:";
const HEAD_PREFIX: &str = "head:";

/// Snapshots with `git stash create`, which records tracked changes without
/// touching the working tree. A clean tree falls back to `HEAD`.
pub struct GitCheckpoints {
    working_dir: PathBuf,
}

impl GitCheckpoints {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, dir = %self.working_dir.display(), "Running git command");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(args = ?args, stderr = %stderr, "Git command failed");
        }

        Ok(output)
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Checkpoint(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl CheckpointProvider for GitCheckpoints {
    async fn snapshot(&self) -> Result<CheckpointId> {
        let stash = self.run_checked(&["stash", "create"]).await?;
        let id = if stash.is_empty() {
            let head = self.run_checked(&["rev-parse", "HEAD"]).await?;
            CheckpointId(format!("{}{}", HEAD_PREFIX, head))
        } else {
            CheckpointId(format!("{}{}", STASH_PREFIX, stash))
        };
        debug!(checkpoint = %id, "Git checkpoint created");
        Ok(id)
    }

    async fn restore(&self, id: &CheckpointId) -> Result<bool> {
        let (base, stash) = if let Some(sha) = id.as_str().strip_prefix(STASH_PREFIX) {
            (format!("{}^1", sha), Some(sha))
        } else if let Some(sha) = id.as_str().strip_prefix(HEAD_PREFIX) {
            (sha.to_string(), None)
        } else {
            return Err(OrchestratorError::Checkpoint(format!(
                "not a git checkpoint: {}",
                id
            )));
        };

        if !self.run(&["reset", "--hard", &base]).await?.status.success() {
            return Ok(false);
        }
        if let Some(sha) = stash
            && !self.run(&["stash", "apply", sha]).await?.status.success()
        {
            return Ok(false);
        }

        info!(checkpoint = %id, "Working tree restored");
        Ok(true)
    }
}
