use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    #[default]
    Idle,
    Planning,
    Executing,
    Verifying,
    /// Blocked on a human decision for a risky unit of work.
    AwaitingApproval,
    Completed,
    Failed,
}

impl OrchestratorState {
    pub fn allowed_transitions(&self) -> &'static [OrchestratorState] {
        use OrchestratorState::*;
        match self {
            Idle => &[Planning, Failed],
            Planning => &[Executing, AwaitingApproval, Failed],
            Executing => &[Verifying, Failed],
            Verifying => &[Planning, AwaitingApproval, Completed, Failed],
            AwaitingApproval => &[Planning, Failed],
            Completed => &[],
            Failed => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrchestratorState) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Planning => "PLANNING",
            Self::Executing => "EXECUTING",
            Self::Verifying => "VERIFYING",
            Self::AwaitingApproval => "AWAITING_APPROVAL",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from: OrchestratorState, to: OrchestratorState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}
