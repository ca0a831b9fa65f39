use serde::{Deserialize, Serialize};

use crate::budget::Dimension;
use crate::decision::DecisionType;
use crate::domain::{AutonomyLevel, OrchestratorState};
use crate::metrics::SessionMetrics;
use crate::scoring::Scores;

/// Everything the orchestrator publishes, plus the cancellation request it consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum OrchestratorEvent {
    SessionStarted {
        session_id: String,
        autonomy_level: AutonomyLevel,
    },
    StateChanged {
        session_id: String,
        from: OrchestratorState,
        to: OrchestratorState,
    },
    IterationStarted {
        session_id: String,
        iteration: u32,
    },
    TaskStarted {
        session_id: String,
        task_id: String,
    },
    TaskCompleted {
        session_id: String,
        task_id: String,
        success: bool,
    },
    DecisionMade {
        session_id: String,
        #[serde(rename = "type")]
        kind: DecisionType,
        approved: bool,
    },
    ResourceWarning {
        session_id: String,
        resource: Dimension,
        percentage: f64,
    },
    MetricsUpdated {
        session_id: String,
        metrics: SessionMetrics,
        scores: Scores,
    },
    SessionCompleted {
        session_id: String,
    },
    SessionFailed {
        session_id: String,
        reason: String,
    },
    CancelRequested {
        session_id: String,
    },
}

impl OrchestratorEvent {
    pub const ALL_NAMES: [&'static str; 11] = [
        "SessionStarted",
        "StateChanged",
        "IterationStarted",
        "TaskStarted",
        "TaskCompleted",
        "DecisionMade",
        "ResourceWarning",
        "MetricsUpdated",
        "SessionCompleted",
        "SessionFailed",
        "CancelRequested",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "SessionStarted",
            Self::StateChanged { .. } => "StateChanged",
            Self::IterationStarted { .. } => "IterationStarted",
            Self::TaskStarted { .. } => "TaskStarted",
            Self::TaskCompleted { .. } => "TaskCompleted",
            Self::DecisionMade { .. } => "DecisionMade",
            Self::ResourceWarning { .. } => "ResourceWarning",
            Self::MetricsUpdated { .. } => "MetricsUpdated",
            Self::SessionCompleted { .. } => "SessionCompleted",
            Self::SessionFailed { .. } => "SessionFailed",
            Self::CancelRequested { .. } => "CancelRequested",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::StateChanged { session_id, .. }
            | Self::IterationStarted { session_id, .. }
            | Self::TaskStarted { session_id, .. }
            | Self::TaskCompleted { session_id, .. }
            | Self::DecisionMade { session_id, .. }
            | Self::ResourceWarning { session_id, .. }
            | Self::MetricsUpdated { session_id, .. }
            | Self::SessionCompleted { session_id }
            | Self::SessionFailed { session_id, .. }
            | Self::CancelRequested { session_id } => session_id,
        }
    }

    /// `"*"` matches every event.
    pub fn matches(&self, name: &str) -> bool {
        name == "*" || name == self.name()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionCompleted { .. } | Self::SessionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let event = OrchestratorEvent::DecisionMade {
            session_id: "ses-1".into(),
            kind: DecisionType::UnattendedDefault,
            approved: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "DecisionMade");
        assert_eq!(json["sessionId"], "ses-1");
        assert_eq!(json["type"], "unattended_default");
        assert_eq!(json["approved"], false);
    }

    #[test]
    fn test_state_change_uses_state_names() {
        let event = OrchestratorEvent::StateChanged {
            session_id: "s".into(),
            from: OrchestratorState::Verifying,
            to: OrchestratorState::AwaitingApproval,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["to"], "AWAITING_APPROVAL");
        let back: OrchestratorEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_matching() {
        let event = OrchestratorEvent::SessionCompleted {
            session_id: "s".into(),
        };
        assert!(event.matches("*"));
        assert!(event.matches("SessionCompleted"));
        assert!(!event.matches("SessionFailed"));
        assert!(event.is_terminal());
        assert!(OrchestratorEvent::ALL_NAMES.contains(&event.name()));
    }
}
