use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::budget::{DEFAULT_WARNING_RATIO, ResourceBudget};
use crate::decision::RejectionPolicy;
use crate::domain::{AutonomyLevel, LevelPolicy, RiskTier};
use crate::error::{OrchestratorError, Result};

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "autonomy.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub budget: BudgetConfig,
    pub safety: SafetyConfig,
    pub decision: DecisionConfig,
    pub scoring: ScoringConfig,
    pub notification: NotificationConfig,
}

impl EngineConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if let Err(e) = self.budget.limits().validate() {
            errors.push(e.to_string());
        }
        if !(self.budget.warning_ratio > 0.0 && self.budget.warning_ratio <= 1.0) {
            errors.push("budget.warning_ratio must be in (0.0, 1.0]".into());
        }

        if self.safety.loop_threshold == 0 {
            errors.push("safety.loop_threshold must be greater than 0".into());
        }

        if self.decision.approval_timeout_ms == 0 {
            errors.push("decision.approval_timeout_ms must be greater than 0".into());
        }
        let mut previous: Option<(AutonomyLevel, RiskTier)> = None;
        for level in AutonomyLevel::ALL {
            let tier = self.decision.policy_for(level).risk_threshold;
            if let Some((prev_level, prev_tier)) = previous
                && tier > prev_tier
            {
                errors.push(format!(
                    "decision.thresholds must be monotonic: {} ({}) is more permissive than {} ({})",
                    level, tier, prev_level, prev_tier
                ));
            }
            previous = Some((level, tier));
        }

        let w = &self.scoring.weights;
        let weights = [
            w.test_coverage,
            w.code_quality,
            w.decision_quality,
            w.efficiency,
            w.safety,
        ];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            errors.push("scoring.weights must be non-negative".into());
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            errors.push("scoring.weights must not all be zero".into());
        }
        if self.scoring.rollback_penalty < 0.0 || self.scoring.loop_penalty < 0.0 {
            errors.push("scoring penalties must be non-negative".into());
        }
        if self.scoring.speed_baseline_ipm <= 0.0 {
            errors.push("scoring.speed_baseline_ipm must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.scoring.speed_smoothing) {
            errors.push("scoring.speed_smoothing must be between 0.0 and 1.0".into());
        }

        if self.notification.channel_capacity == 0 {
            errors.push("notification.channel_capacity must be greater than 0".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub autonomy_level: AutonomyLevel,
    pub unattended: bool,
}

/// Limits from the config file. Unset limits fall through to lower layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files_changed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_actions: Option<u64>,
    pub warning_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            max_cost_usd: None,
            max_duration_minutes: None,
            max_files_changed: None,
            max_actions: None,
            warning_ratio: DEFAULT_WARNING_RATIO,
        }
    }
}

impl BudgetConfig {
    pub fn limits(&self) -> ResourceBudget {
        ResourceBudget {
            max_tokens: self.max_tokens,
            max_cost_usd: self.max_cost_usd,
            max_duration_minutes: self.max_duration_minutes,
            max_files_changed: self.max_files_changed,
            max_actions: self.max_actions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Consecutive no-progress failures of one signature that trigger a loop break.
    pub loop_threshold: u32,
    /// Loop breaks tolerated before the governor trips.
    pub max_loop_breaks: u32,
    pub max_rollbacks: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            loop_threshold: 3,
            max_loop_breaks: 10,
            max_rollbacks: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub approval_timeout_ms: u64,
    pub rejection_policy: RejectionPolicy,
    /// Per-level overrides of the auto-approve risk threshold.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<AutonomyLevel, RiskTier>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            approval_timeout_ms: 300_000,
            rejection_policy: RejectionPolicy::default(),
            thresholds: BTreeMap::new(),
        }
    }
}

impl DecisionConfig {
    pub fn policy_for(&self, level: AutonomyLevel) -> LevelPolicy {
        let base = level.policy();
        match self.thresholds.get(&level) {
            Some(tier) => LevelPolicy::new(*tier, base.unattended_default),
            None => base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub test_coverage: f64,
    pub code_quality: f64,
    pub decision_quality: f64,
    pub efficiency: f64,
    pub safety: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            test_coverage: 1.0,
            code_quality: 1.0,
            decision_quality: 1.0,
            efficiency: 1.0,
            safety: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: QualityWeights,
    pub rollback_penalty: f64,
    pub loop_penalty: f64,
    /// Iterations per minute that map to a speed of 100.
    pub speed_baseline_ipm: f64,
    /// Weight of the newest speed sample in the moving average.
    pub speed_smoothing: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            rollback_penalty: 10.0,
            loop_penalty: 10.0,
            speed_baseline_ipm: 2.0,
            speed_smoothing: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub event_log: bool,
    pub logs_dir: PathBuf,
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            event_log: true,
            logs_dir: PathBuf::from(".autonomy/logs"),
            channel_capacity: 256,
        }
    }
}
