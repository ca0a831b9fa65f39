use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// How much the orchestrator may act without human confirmation.
///
/// Variants are declared from least to most permissive so that the derived
/// ordering reads naturally: `Lunatic > Insane > ... > Timid`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyLevel {
    /// Minimal autonomy, every non-trivial step needs a human.
    Timid,
    /// Cautiously autonomous, only well-defined low-risk steps.
    Bold,
    /// Partially autonomous.
    Wild,
    /// Significantly autonomous.
    #[default]
    Crazy,
    /// Highly autonomous, humans are consulted for critical steps only.
    Insane,
    /// Fully autonomous, no human intervention.
    Lunatic,
}

impl AutonomyLevel {
    /// All levels, most permissive first.
    pub const ALL: [AutonomyLevel; 6] = [
        Self::Lunatic,
        Self::Insane,
        Self::Crazy,
        Self::Wild,
        Self::Bold,
        Self::Timid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lunatic => "lunatic",
            Self::Insane => "insane",
            Self::Crazy => "crazy",
            Self::Wild => "wild",
            Self::Bold => "bold",
            Self::Timid => "timid",
        }
    }

    /// Default strictness entry for this level.
    pub fn policy(&self) -> LevelPolicy {
        match self {
            Self::Lunatic => LevelPolicy::new(RiskTier::Critical, UnattendedDefault::Approve),
            Self::Insane => LevelPolicy::new(RiskTier::High, UnattendedDefault::Approve),
            Self::Crazy => LevelPolicy::new(RiskTier::Medium, UnattendedDefault::Approve),
            Self::Wild => LevelPolicy::new(RiskTier::Medium, UnattendedDefault::Reject),
            Self::Bold => LevelPolicy::new(RiskTier::Low, UnattendedDefault::Reject),
            Self::Timid => LevelPolicy::new(RiskTier::Safe, UnattendedDefault::Reject),
        }
    }

    /// Base craziness contribution of the level (0-100).
    pub fn craziness_score(&self) -> u8 {
        match self {
            Self::Lunatic => 95,
            Self::Insane => 85,
            Self::Crazy => 75,
            Self::Wild => 60,
            Self::Bold => 40,
            Self::Timid => 15,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Lunatic => "Fully autonomous, no human intervention",
            Self::Insane => "Highly autonomous, notify before critical decisions",
            Self::Crazy => "Significantly autonomous, semi-automatic execution",
            Self::Wild => "Partially autonomous, simple tasks only",
            Self::Bold => "Cautiously autonomous, predefined steps only",
            Self::Timid => "Minimal autonomy, information gathering only",
        }
    }
}

impl fmt::Display for AutonomyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutonomyLevel {
    type Err = OrchestratorError;

    /// Case-sensitive: `"Crazy"` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| OrchestratorError::InvalidAutonomyLevel(s.to_string()))
    }
}

/// Declared risk of a proposed action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Read-only, analysis.
    Safe,
    /// Suggestions, reviews.
    Low,
    /// Minor code changes, file edits.
    #[default]
    Medium,
    /// External API calls, purchases, code execution.
    High,
    /// Destructive operations, large transactions.
    Critical,
}

impl RiskTier {
    pub fn value(&self) -> u8 {
        match self {
            Self::Safe => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a blocking decision resolves to when nobody can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnattendedDefault {
    Approve,
    Reject,
}

impl UnattendedDefault {
    pub fn approves(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

/// Strictness of one autonomy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPolicy {
    /// Highest risk tier that is approved without asking.
    pub risk_threshold: RiskTier,
    pub unattended_default: UnattendedDefault,
}

impl LevelPolicy {
    pub const fn new(risk_threshold: RiskTier, unattended_default: UnattendedDefault) -> Self {
        Self {
            risk_threshold,
            unattended_default,
        }
    }

    pub fn auto_approves(&self, tier: RiskTier) -> bool {
        tier <= self.risk_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_is_by_permissiveness() {
        assert!(AutonomyLevel::Lunatic > AutonomyLevel::Insane);
        assert!(AutonomyLevel::Insane > AutonomyLevel::Crazy);
        assert!(AutonomyLevel::Crazy > AutonomyLevel::Wild);
        assert!(AutonomyLevel::Wild > AutonomyLevel::Bold);
        assert!(AutonomyLevel::Bold > AutonomyLevel::Timid);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            "lunatic".parse::<AutonomyLevel>().unwrap(),
            AutonomyLevel::Lunatic
        );
        assert_eq!("timid".parse::<AutonomyLevel>().unwrap(), AutonomyLevel::Timid);
        assert!("Crazy".parse::<AutonomyLevel>().is_err());
        assert!("reckless".parse::<AutonomyLevel>().is_err());
    }

    #[test]
    fn test_default_thresholds_are_monotonic() {
        let thresholds: Vec<RiskTier> = AutonomyLevel::ALL
            .iter()
            .map(|l| l.policy().risk_threshold)
            .collect();
        assert!(thresholds.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_unattended_defaults_split_at_crazy() {
        for level in AutonomyLevel::ALL {
            let approves = level.policy().unattended_default.approves();
            assert_eq!(approves, level >= AutonomyLevel::Crazy, "level {}", level);
        }
    }

    #[test]
    fn test_policy_auto_approves_at_or_below_threshold() {
        let policy = AutonomyLevel::Bold.policy();
        assert!(policy.auto_approves(RiskTier::Safe));
        assert!(policy.auto_approves(RiskTier::Low));
        assert!(!policy.auto_approves(RiskTier::Medium));
    }

    #[test]
    fn test_craziness_score_follows_level() {
        assert_eq!(AutonomyLevel::Lunatic.craziness_score(), 95);
        assert_eq!(AutonomyLevel::Crazy.craziness_score(), 75);
        assert_eq!(AutonomyLevel::Timid.craziness_score(), 15);
    }
}
