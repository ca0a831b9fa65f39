use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::Dimension;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session already started: {session_id}")]
    AlreadyStarted { session_id: String },

    #[error("Negative resource delta for {dimension}: {value}")]
    NegativeDelta { dimension: Dimension, value: f64 },

    #[error("Budget exhausted: {dimension} limit reached ({used}/{limit})")]
    BudgetExhausted {
        dimension: Dimension,
        used: f64,
        limit: f64,
    },

    #[error("Safety tripped: {reason} (loops broken: {loops_broken}, rollbacks: {rollbacks})")]
    SafetyTripped {
        reason: String,
        loops_broken: u32,
        rollbacks: u32,
    },

    #[error("Human decision timed out after {timeout_ms}ms for action '{action}'")]
    DecisionTimeout { action: String, timeout_ms: u64 },

    #[error("Action rejected: {action}")]
    DecisionRejected { action: String },

    #[error("Session cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from} -> {to} (allowed: {allowed})")]
    InvalidStateTransition {
        from: String,
        to: String,
        allowed: String,
    },

    #[error("Invalid budget string: {0}")]
    InvalidBudget(String),

    #[error("Unknown autonomy level: {0} (expected lunatic|insane|crazy|wild|bold|timid)")]
    InvalidAutonomyLevel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task executor error: {0}")]
    Executor(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Human channel error: {0}")]
    HumanChannel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Stable classification of an error, used in session outcomes and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    AlreadyStarted,
    NegativeDelta,
    BudgetExhausted,
    SafetyTripped,
    DecisionTimeout,
    DecisionRejected,
    Cancelled,
    InvalidStateTransition,
    InvalidInput,
    Config,
    Executor,
    Checkpoint,
    HumanChannel,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::AlreadyStarted => "already_started",
            Self::NegativeDelta => "negative_delta",
            Self::BudgetExhausted => "budget_exhausted",
            Self::SafetyTripped => "safety_tripped",
            Self::DecisionTimeout => "decision_timeout",
            Self::DecisionRejected => "decision_rejected",
            Self::Cancelled => "cancelled",
            Self::InvalidStateTransition => "invalid_state_transition",
            Self::InvalidInput => "invalid_input",
            Self::Config => "config",
            Self::Executor => "executor",
            Self::Checkpoint => "checkpoint",
            Self::HumanChannel => "human_channel",
            Self::Io => "io",
        }
    }

    /// Errors that indicate a bug in the caller or an injected capability.
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest | Self::AlreadyStarted | Self::NegativeDelta
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::AlreadyStarted { .. } => ErrorKind::AlreadyStarted,
            Self::NegativeDelta { .. } => ErrorKind::NegativeDelta,
            Self::BudgetExhausted { .. } => ErrorKind::BudgetExhausted,
            Self::SafetyTripped { .. } => ErrorKind::SafetyTripped,
            Self::DecisionTimeout { .. } => ErrorKind::DecisionTimeout,
            Self::DecisionRejected { .. } => ErrorKind::DecisionRejected,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            Self::InvalidBudget(_) | Self::InvalidAutonomyLevel(_) => ErrorKind::InvalidInput,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
            Self::Executor(_) => ErrorKind::Executor,
            Self::Checkpoint(_) => ErrorKind::Checkpoint,
            Self::HumanChannel(_) => ErrorKind::HumanChannel,
            Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }

    pub fn is_hard_failure(&self) -> bool {
        self.kind().is_hard_failure()
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
