use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::action::ProposedAction;
use crate::domain::{AutonomyLevel, LevelPolicy};
use crate::error::Result;

/// What happens to a unit whose action ends up rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// The session fails.
    #[default]
    Fail,
    /// The unit is dropped and planning resumes.
    Skip,
}

/// Result of evaluating an action against the level policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Risk is at or below the level's threshold.
    AutoApproved,
    /// Unattended session, risk above threshold, default approves.
    UnattendedApproved,
    /// Unattended session, risk above threshold, default rejects.
    AutoRejected,
    /// Attended session, risk above threshold.
    NeedsHuman,
}

impl GateOutcome {
    /// The final decision, unless a human must be asked.
    pub fn decision(&self) -> Option<Decision> {
        match self {
            Self::AutoApproved => Some(Decision::new(DecisionType::Auto, true)),
            Self::UnattendedApproved => Some(Decision::new(DecisionType::UnattendedDefault, true)),
            Self::AutoRejected => Some(Decision::new(DecisionType::UnattendedDefault, false)),
            Self::NeedsHuman => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Auto,
    Human,
    UnattendedDefault,
    Timeout,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Human => "human",
            Self::UnattendedDefault => "unattended_default",
            Self::Timeout => "timeout",
        }
    }

    /// Decided without a human.
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Auto | Self::UnattendedDefault)
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A final approve/reject verdict and how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "type")]
    pub kind: DecisionType,
    pub approved: bool,
}

impl Decision {
    pub fn new(kind: DecisionType, approved: bool) -> Self {
        Self { kind, approved }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanVerdict {
    Approve,
    Reject,
}

impl HumanVerdict {
    pub fn approved(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

/// Context shown to the human asked to approve an action.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub session_id: String,
    pub unit_id: String,
    pub autonomy_level: AutonomyLevel,
    pub action: ProposedAction,
    pub timeout_ms: u64,
}

/// Channel through which a human approves or rejects an action.
#[async_trait]
pub trait HumanChannel: Send + Sync {
    async fn ask(&self, request: &ApprovalRequest) -> Result<HumanVerdict>;
}

/// Pure threshold check.
pub fn evaluate(action: &ProposedAction, policy: LevelPolicy, unattended: bool) -> GateOutcome {
    if policy.auto_approves(action.risk_tier()) {
        GateOutcome::AutoApproved
    } else if !unattended {
        GateOutcome::NeedsHuman
    } else if policy.unattended_default.approves() {
        GateOutcome::UnattendedApproved
    } else {
        GateOutcome::AutoRejected
    }
}

/// Applies the autonomy level's strictness to proposed actions.
pub struct DecisionGate {
    level: AutonomyLevel,
    policy: LevelPolicy,
    unattended: bool,
    timeout: Duration,
    channel: Option<Arc<dyn HumanChannel>>,
}

impl DecisionGate {
    pub fn new(
        level: AutonomyLevel,
        policy: LevelPolicy,
        unattended: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            level,
            policy,
            unattended,
            timeout,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn HumanChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn set_channel(&mut self, channel: Option<Arc<dyn HumanChannel>>) {
        self.channel = channel;
    }

    pub fn evaluate(&self, action: &ProposedAction) -> GateOutcome {
        let outcome = evaluate(action, self.policy, self.unattended);
        debug!(
            action = %action.label(),
            risk = %action.risk_tier(),
            threshold = %self.policy.risk_threshold,
            outcome = ?outcome,
            "Gate evaluated action"
        );
        outcome
    }

    /// Asks the human channel, bounded by the approval timeout.
    ///
    /// No channel, a channel error and an elapsed timeout all resolve to the
    /// level's unattended default with [`DecisionType::Timeout`].
    pub async fn ask_human(&self, request: &ApprovalRequest) -> Decision {
        let fallback = Decision::new(DecisionType::Timeout, self.policy.unattended_default.approves());

        let Some(channel) = &self.channel else {
            info!(
                action = %request.action.label(),
                level = %self.level,
                "No human channel, applying timeout default"
            );
            return fallback;
        };

        match tokio::time::timeout(self.timeout, channel.ask(request)).await {
            Ok(Ok(verdict)) => {
                info!(action = %request.action.label(), verdict = ?verdict, "Human decided");
                Decision::new(DecisionType::Human, verdict.approved())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Human channel failed, applying timeout default");
                fallback
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    action = %request.action.label(),
                    "Human decision timed out"
                );
                fallback
            }
        }
    }
}
