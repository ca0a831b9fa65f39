use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub String);

impl CheckpointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshots and restores the workspace the executor operates on.
#[async_trait]
pub trait CheckpointProvider: Send + Sync {
    async fn snapshot(&self) -> Result<CheckpointId>;

    /// Returns `false` when the checkpoint exists but could not be applied.
    async fn restore(&self, id: &CheckpointId) -> Result<bool>;
}

#[async_trait]
impl<P: CheckpointProvider + ?Sized> CheckpointProvider for Arc<P> {
    async fn snapshot(&self) -> Result<CheckpointId> {
        (**self).snapshot().await
    }

    async fn restore(&self, id: &CheckpointId) -> Result<bool> {
        (**self).restore(id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    snapshots: Vec<CheckpointId>,
    restored: Vec<CheckpointId>,
}

/// Records snapshot/restore calls without touching any workspace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpoints {
    state: Arc<Mutex<InMemoryState>>,
    fail_restores: bool,
}

impl InMemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every restore reports failure, for exercising safety trips.
    pub fn failing() -> Self {
        Self {
            fail_restores: true,
            ..Self::default()
        }
    }

    pub fn snapshots(&self) -> Vec<CheckpointId> {
        self.state.lock().snapshots.clone()
    }

    pub fn restored(&self) -> Vec<CheckpointId> {
        self.state.lock().restored.clone()
    }
}

#[async_trait]
impl CheckpointProvider for InMemoryCheckpoints {
    async fn snapshot(&self) -> Result<CheckpointId> {
        let mut state = self.state.lock();
        let id = CheckpointId(format!("mem-{}", state.snapshots.len() + 1));
        state.snapshots.push(id.clone());
        Ok(id)
    }

    async fn restore(&self, id: &CheckpointId) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.snapshots.contains(id) {
            return Err(OrchestratorError::Checkpoint(format!(
                "unknown checkpoint {}",
                id
            )));
        }
        if self.fail_restores {
            return Ok(false);
        }
        state.restored.push(id.clone());
        Ok(true)
    }
}
