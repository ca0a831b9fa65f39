use serde::{Deserialize, Serialize};

use super::settings::{DecisionConfig, EngineConfig, SafetyConfig, ScoringConfig};
use crate::budget::{DEFAULT_WARNING_RATIO, ResourceBudget};
use crate::domain::{AutonomyLevel, LevelPolicy};

/// Immutable configuration of one orchestration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub autonomy_level: AutonomyLevel,
    pub resource_budget: ResourceBudget,
    pub unattended: bool,
    pub warning_ratio: f64,
    pub safety: SafetyConfig,
    pub decision: DecisionConfig,
    pub scoring: ScoringConfig,
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new(AutonomyLevel::default(), ResourceBudget::unbounded())
    }
}

impl OrchestratorConfig {
    pub fn new(autonomy_level: AutonomyLevel, resource_budget: ResourceBudget) -> Self {
        Self {
            autonomy_level,
            resource_budget,
            unattended: false,
            warning_ratio: DEFAULT_WARNING_RATIO,
            safety: SafetyConfig::default(),
            decision: DecisionConfig::default(),
            scoring: ScoringConfig::default(),
            event_channel_capacity: 256,
        }
    }

    /// Folds a loaded config file and an already resolved budget together.
    pub fn from_engine_config(config: &EngineConfig, resource_budget: ResourceBudget) -> Self {
        Self {
            autonomy_level: config.session.autonomy_level,
            resource_budget,
            unattended: config.session.unattended,
            warning_ratio: config.budget.warning_ratio,
            safety: config.safety.clone(),
            decision: config.decision.clone(),
            scoring: config.scoring.clone(),
            event_channel_capacity: config.notification.channel_capacity,
        }
    }

    pub fn unattended(mut self, unattended: bool) -> Self {
        self.unattended = unattended;
        self
    }

    pub fn with_safety(mut self, safety: SafetyConfig) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_decision(mut self, decision: DecisionConfig) -> Self {
        self.decision = decision;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn level_policy(&self) -> LevelPolicy {
        self.decision.policy_for(self.autonomy_level)
    }
}
