use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::checkpoint::{CheckpointId, CheckpointProvider};
use crate::budget::{RemainingBudget, ResourceTracker, ResourceUsage};
use crate::config::SafetyConfig;
use crate::error::OrchestratorError;
use crate::executor::{ExecutionReport, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub usage: ResourceUsage,
    pub remaining: RemainingBudget,
    pub surplus_ratio: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStatus {
    pub loops_broken: u32,
    pub recovered: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackStatus {
    pub count: u32,
}

/// Point-in-time safety snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyStatus {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub resources: ResourceStatus,
    pub loops: LoopStatus,
    pub rollbacks: RollbackStatus,
}

/// What the governor concluded about the last unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Continue,
    /// A signature hit the loop threshold and was abandoned.
    LoopBroken { signature: String },
    RolledBack { checkpoint: CheckpointId },
    /// Irrecoverable. The session must fail.
    Tripped { reason: String },
}

/// Loop detection and rollback circuit breaker.
pub struct SafetyGovernor {
    config: SafetyConfig,
    provider: Option<Arc<dyn CheckpointProvider>>,
    no_progress: HashMap<String, u32>,
    last_signature: Option<String>,
    abandoned: Vec<String>,
    loops_broken: u32,
    recovered: u32,
    pending_recovery: u32,
    rollbacks: u32,
    known_good: Option<CheckpointId>,
    tripped: Option<String>,
}

impl SafetyGovernor {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            provider: None,
            no_progress: HashMap::new(),
            last_signature: None,
            abandoned: Vec::new(),
            loops_broken: 0,
            recovered: 0,
            pending_recovery: 0,
            rollbacks: 0,
            known_good: None,
            tripped: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn CheckpointProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn set_provider(&mut self, provider: Option<Arc<dyn CheckpointProvider>>) {
        self.provider = provider;
    }

    /// Clears all counters for a new session. The provider is kept.
    pub fn reset(&mut self) {
        self.no_progress.clear();
        self.last_signature = None;
        self.abandoned.clear();
        self.loops_broken = 0;
        self.recovered = 0;
        self.pending_recovery = 0;
        self.rollbacks = 0;
        self.known_good = None;
        self.tripped = None;
    }

    pub fn is_safe(&self) -> bool {
        self.tripped.is_none()
    }

    pub fn loops_broken(&self) -> u32 {
        self.loops_broken
    }

    pub fn recovered(&self) -> u32 {
        self.recovered
    }

    pub fn rollbacks(&self) -> u32 {
        self.rollbacks
    }

    pub fn abandoned_signatures(&self) -> &[String] {
        &self.abandoned
    }

    pub fn known_good(&self) -> Option<&CheckpointId> {
        self.known_good.as_ref()
    }

    pub fn trip_error(&self) -> Option<OrchestratorError> {
        self.tripped
            .as_ref()
            .map(|reason| OrchestratorError::SafetyTripped {
                reason: reason.clone(),
                loops_broken: self.loops_broken,
                rollbacks: self.rollbacks,
            })
    }

    /// Snapshots the workspace as the new rollback target. Failures are logged.
    pub async fn mark_known_good(&mut self) {
        let Some(provider) = &self.provider else {
            return;
        };
        match provider.snapshot().await {
            Ok(id) => {
                debug!(checkpoint = %id, "Known-good checkpoint recorded");
                self.known_good = Some(id);
            }
            Err(e) => warn!(error = %e, "Checkpoint snapshot failed"),
        }
    }

    /// Updates loop and rollback state from one executed unit.
    pub async fn evaluate(&mut self, unit: &UnitOfWork, report: &ExecutionReport) -> SafetyVerdict {
        if let Some(reason) = &self.tripped {
            return SafetyVerdict::Tripped {
                reason: reason.clone(),
            };
        }

        if report.catastrophic {
            return self.rollback().await;
        }

        if report.success {
            self.no_progress.remove(&unit.signature);
            self.last_signature = Some(unit.signature.clone());
            if self.pending_recovery > 0 {
                info!(recovered = self.pending_recovery, "Recovered after loop break");
                self.recovered += self.pending_recovery;
                self.pending_recovery = 0;
            }
            self.mark_known_good().await;
            return SafetyVerdict::Continue;
        }

        self.record_failure(unit, report.progress)
    }

    fn record_failure(&mut self, unit: &UnitOfWork, progress: bool) -> SafetyVerdict {
        if self.last_signature.as_deref() != Some(unit.signature.as_str()) {
            self.no_progress.clear();
        }
        self.last_signature = Some(unit.signature.clone());

        if progress {
            self.no_progress.remove(&unit.signature);
            return SafetyVerdict::Continue;
        }

        let count = self.no_progress.entry(unit.signature.clone()).or_insert(0);
        *count += 1;
        debug!(signature = %unit.signature, count = *count, "No-progress failure");

        if *count < self.config.loop_threshold {
            return SafetyVerdict::Continue;
        }

        self.no_progress.remove(&unit.signature);
        self.last_signature = None;
        self.abandoned.push(unit.signature.clone());
        self.loops_broken += 1;
        self.pending_recovery += 1;
        warn!(
            signature = %unit.signature,
            loops_broken = self.loops_broken,
            "Loop detected, abandoning approach"
        );

        if self.loops_broken > self.config.max_loop_breaks {
            return self.trip(format!(
                "loop breaks exceeded limit of {}",
                self.config.max_loop_breaks
            ));
        }

        SafetyVerdict::LoopBroken {
            signature: unit.signature.clone(),
        }
    }

    async fn rollback(&mut self) -> SafetyVerdict {
        if self.rollbacks >= self.config.max_rollbacks {
            return self.trip(format!(
                "rollback limit of {} exceeded",
                self.config.max_rollbacks
            ));
        }
        let Some(provider) = self.provider.clone() else {
            return self.trip("catastrophic failure with no checkpoint provider".into());
        };
        let Some(checkpoint) = self.known_good.clone() else {
            return self.trip("catastrophic failure with no known-good checkpoint".into());
        };

        match provider.restore(&checkpoint).await {
            Ok(true) => {
                self.rollbacks += 1;
                self.no_progress.clear();
                self.last_signature = None;
                warn!(checkpoint = %checkpoint, rollbacks = self.rollbacks, "Rolled back to checkpoint");
                SafetyVerdict::RolledBack { checkpoint }
            }
            Ok(false) => self.trip(format!("rollback to {} failed", checkpoint)),
            Err(e) => self.trip(format!("rollback to {} failed: {}", checkpoint, e)),
        }
    }

    fn trip(&mut self, reason: String) -> SafetyVerdict {
        error!(
            reason = %reason,
            loops_broken = self.loops_broken,
            rollbacks = self.rollbacks,
            "Safety governor tripped"
        );
        self.tripped = Some(reason.clone());
        SafetyVerdict::Tripped { reason }
    }

    pub fn status(&self, tracker: &ResourceTracker) -> SafetyStatus {
        let exhausted = tracker.exhausted_dimension();
        let reason = self.tripped.clone().or_else(|| {
            exhausted.map(|dimension| format!("{} limit reached", dimension))
        });

        SafetyStatus {
            safe: self.tripped.is_none() && exhausted.is_none(),
            reason,
            resources: ResourceStatus {
                usage: *tracker.usage(),
                remaining: tracker.remaining(),
                surplus_ratio: tracker.surplus_ratio(),
            },
            loops: LoopStatus {
                loops_broken: self.loops_broken,
                recovered: self.recovered,
            },
            rollbacks: RollbackStatus {
                count: self.rollbacks,
            },
        }
    }
}
