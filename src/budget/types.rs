use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// One accounted resource dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Tokens,
    Cost,
    Duration,
    FilesChanged,
    Actions,
}

impl Dimension {
    /// Evaluation order for exhaustion and warnings.
    pub const ALL: [Dimension; 5] = [
        Self::Tokens,
        Self::Cost,
        Self::Duration,
        Self::FilesChanged,
        Self::Actions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Cost => "cost",
            Self::Duration => "duration",
            Self::FilesChanged => "files_changed",
            Self::Actions => "actions",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Cost => "USD",
            Self::Duration => "min",
            Self::FilesChanged => "files",
            Self::Actions => "actions",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured limits. `None` means unbounded for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBudget {
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
}

impl ResourceBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Limits applied by the CLI when no layer configures a dimension.
    pub fn hard_defaults() -> Self {
        Self {
            max_tokens: Some(100_000),
            max_cost_usd: Some(5.0),
            max_duration_minutes: Some(10.0),
            max_files_changed: None,
            max_actions: None,
        }
    }

    pub fn with_max_tokens(mut self, max: u64) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_cost_usd(mut self, max: f64) -> Self {
        self.max_cost_usd = Some(max);
        self
    }

    pub fn with_max_duration_minutes(mut self, max: f64) -> Self {
        self.max_duration_minutes = Some(max);
        self
    }

    pub fn with_max_files_changed(mut self, max: u64) -> Self {
        self.max_files_changed = Some(max);
        self
    }

    pub fn with_max_actions(mut self, max: u64) -> Self {
        self.max_actions = Some(max);
        self
    }

    /// Limit expressed in the dimension's unit (duration in minutes).
    pub fn limit(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Tokens => self.max_tokens.map(|v| v as f64),
            Dimension::Cost => self.max_cost_usd,
            Dimension::Duration => self.max_duration_minutes,
            Dimension::FilesChanged => self.max_files_changed.map(|v| v as f64),
            Dimension::Actions => self.max_actions.map(|v| v as f64),
        }
    }

    pub fn configured_dimensions(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL
            .into_iter()
            .filter_map(|d| self.limit(d).map(|max| (d, max)))
    }

    pub fn is_unbounded(&self) -> bool {
        self.configured_dimensions().next().is_none()
    }

    /// Fills every dimension missing here from `lower`.
    pub fn or(self, lower: &ResourceBudget) -> Self {
        Self {
            max_tokens: self.max_tokens.or(lower.max_tokens),
            max_cost_usd: self.max_cost_usd.or(lower.max_cost_usd),
            max_duration_minutes: self.max_duration_minutes.or(lower.max_duration_minutes),
            max_files_changed: self.max_files_changed.or(lower.max_files_changed),
            max_actions: self.max_actions.or(lower.max_actions),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (dimension, max) in self.configured_dimensions() {
            if !max.is_finite() || max < 0.0 {
                return Err(OrchestratorError::InvalidBudget(format!(
                    "{} limit must be a non-negative number, got {}",
                    dimension, max
                )));
            }
        }
        Ok(())
    }
}

/// Running totals. Only the tracker mutates these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub tokens: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub files_changed: u64,
    pub actions: u64,
}

impl ResourceUsage {
    /// Usage expressed in the dimension's limit unit.
    pub fn amount(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Tokens => self.tokens as f64,
            Dimension::Cost => self.cost_usd,
            Dimension::Duration => self.duration_ms as f64 / 60_000.0,
            Dimension::FilesChanged => self.files_changed as f64,
            Dimension::Actions => self.actions as f64,
        }
    }
}

/// Increment reported for one unit of work.
///
/// Fields are signed so that a misbehaving executor can be detected instead of
/// silently wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceDelta {
    pub tokens: i64,
    #[serde(alias = "costUSD")]
    pub cost_usd: f64,
    pub duration_ms: i64,
    pub files_changed: i64,
    pub actions: i64,
}

impl ResourceDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(mut self, tokens: i64) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn files_changed(mut self, files: i64) -> Self {
        self.files_changed = files;
        self
    }

    pub fn actions(mut self, actions: i64) -> Self {
        self.actions = actions;
        self
    }

    /// Component-wise sum, used by the orchestrator to add its own charges.
    pub fn plus(self, other: ResourceDelta) -> Self {
        Self {
            tokens: self.tokens.saturating_add(other.tokens),
            cost_usd: self.cost_usd + other.cost_usd,
            duration_ms: self.duration_ms.saturating_add(other.duration_ms),
            files_changed: self.files_changed.saturating_add(other.files_changed),
            actions: self.actions.saturating_add(other.actions),
        }
    }

    /// Rejects any negative or non-finite component.
    pub fn validate(&self) -> Result<()> {
        let integers = [
            (Dimension::Tokens, self.tokens),
            (Dimension::Duration, self.duration_ms),
            (Dimension::FilesChanged, self.files_changed),
            (Dimension::Actions, self.actions),
        ];
        if let Some((dimension, value)) = integers.into_iter().find(|(_, v)| *v < 0) {
            return Err(OrchestratorError::NegativeDelta {
                dimension,
                value: value as f64,
            });
        }
        if !self.cost_usd.is_finite() || self.cost_usd < 0.0 {
            return Err(OrchestratorError::NegativeDelta {
                dimension: Dimension::Cost,
                value: self.cost_usd,
            });
        }
        Ok(())
    }
}

/// Remaining allowance per dimension; `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingBudget {
    pub tokens: Option<f64>,
    #[serde(rename = "costUSD")]
    pub cost_usd: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub files_changed: Option<f64>,
    pub actions: Option<f64>,
}

impl RemainingBudget {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Tokens => self.tokens,
            Dimension::Cost => self.cost_usd,
            Dimension::Duration => self.duration_minutes,
            Dimension::FilesChanged => self.files_changed,
            Dimension::Actions => self.actions,
        }
    }

    pub(crate) fn set(&mut self, dimension: Dimension, value: f64) {
        let slot = match dimension {
            Dimension::Tokens => &mut self.tokens,
            Dimension::Cost => &mut self.cost_usd,
            Dimension::Duration => &mut self.duration_minutes,
            Dimension::FilesChanged => &mut self.files_changed,
            Dimension::Actions => &mut self.actions,
        };
        *slot = Some(value);
    }
}

/// A dimension crossed the warning ratio for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceWarning {
    pub resource: Dimension,
    /// Utilization in percent, may exceed 100 on overrun.
    pub percentage: f64,
}
