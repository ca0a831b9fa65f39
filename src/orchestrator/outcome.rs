use serde::{Deserialize, Serialize};

use crate::domain::OrchestratorState;
use crate::error::{ErrorKind, OrchestratorError};
use crate::scoring::{CrazinessScoreBreakdown, QualityScoreBreakdown, Scores};

/// Scores and usage of a session, final or at the point of failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub quality_score: f64,
    pub craziness_score: f64,
    pub quality: QualityScoreBreakdown,
    pub craziness: CrazinessScoreBreakdown,
    pub duration_ms: u64,
    pub tokens_used: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    pub iterations_completed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl SessionResult {
    pub(crate) fn from_scores(scores: &Scores) -> Self {
        Self {
            quality_score: scores.quality.overall,
            craziness_score: scores.craziness.overall,
            quality: scores.quality,
            craziness: scores.craziness,
            duration_ms: 0,
            tokens_used: 0,
            cost_usd: 0.0,
            iterations_completed: 0,
            output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFailure {
    pub kind: ErrorKind,
    pub reason: String,
    pub partial: SessionResult,
}

impl SessionFailure {
    pub fn new(error: &OrchestratorError, partial: SessionResult) -> Self {
        Self {
            kind: error.kind(),
            reason: error.to_string(),
            partial,
        }
    }
}

/// What `process` returns for every terminal state. Exactly one of `result`
/// and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub success: bool,
    pub session_id: String,
    pub state: OrchestratorState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionFailure>,
}

impl SessionOutcome {
    pub fn completed(session_id: impl Into<String>, result: SessionResult) -> Self {
        Self {
            success: true,
            session_id: session_id.into(),
            state: OrchestratorState::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(session_id: impl Into<String>, failure: SessionFailure) -> Self {
        Self {
            success: false,
            session_id: session_id.into(),
            state: OrchestratorState::Failed,
            result: None,
            error: Some(failure),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Final result on success, partial result on failure.
    pub fn scores(&self) -> Option<&SessionResult> {
        self.result
            .as_ref()
            .or_else(|| self.error.as_ref().map(|e| &e.partial))
    }
}
