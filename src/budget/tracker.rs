use std::collections::HashSet;

use tracing::{debug, warn};

use super::types::{
    Dimension, RemainingBudget, ResourceBudget, ResourceDelta, ResourceUsage, ResourceWarning,
};
use crate::error::{OrchestratorError, Result};

/// Default utilization at which a one-shot warning is raised.
pub const DEFAULT_WARNING_RATIO: f64 = 0.8;

/// Accounts consumption against a [`ResourceBudget`]. Pure bookkeeping, no I/O.
#[derive(Debug, Clone)]
pub struct ResourceTracker {
    budget: ResourceBudget,
    usage: ResourceUsage,
    warning_ratio: f64,
    warned: HashSet<Dimension>,
}

impl ResourceTracker {
    pub fn new(budget: ResourceBudget) -> Self {
        Self::with_warning_ratio(budget, DEFAULT_WARNING_RATIO)
    }

    pub fn with_warning_ratio(budget: ResourceBudget, warning_ratio: f64) -> Self {
        Self {
            budget,
            usage: ResourceUsage::default(),
            warning_ratio,
            warned: HashSet::new(),
        }
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    /// Adds `delta` to usage and returns warnings crossed for the first time.
    ///
    /// The whole delta is validated before any dimension is touched, so a
    /// rejected delta leaves usage unchanged.
    pub fn record(&mut self, delta: &ResourceDelta) -> Result<Vec<ResourceWarning>> {
        delta.validate()?;

        self.usage.tokens = self.usage.tokens.saturating_add(delta.tokens as u64);
        self.usage.cost_usd += delta.cost_usd;
        self.usage.duration_ms = self.usage.duration_ms.saturating_add(delta.duration_ms as u64);
        self.usage.files_changed = self
            .usage
            .files_changed
            .saturating_add(delta.files_changed as u64);
        self.usage.actions = self.usage.actions.saturating_add(delta.actions as u64);

        debug!(
            tokens = self.usage.tokens,
            cost_usd = self.usage.cost_usd,
            actions = self.usage.actions,
            "Resource usage recorded"
        );

        Ok(self.collect_warnings())
    }

    fn collect_warnings(&mut self) -> Vec<ResourceWarning> {
        let mut warnings = Vec::new();
        for dimension in Dimension::ALL {
            if self.warned.contains(&dimension) {
                continue;
            }
            let Some(ratio) = self.utilization(dimension) else {
                continue;
            };
            if ratio >= self.warning_ratio {
                self.warned.insert(dimension);
                let percentage = (ratio * 1000.0).round() / 10.0;
                warn!(%dimension, percentage, "Resource usage crossed warning threshold");
                warnings.push(ResourceWarning {
                    resource: dimension,
                    percentage,
                });
            }
        }
        warnings
    }

    /// Used fraction of a configured dimension, unclamped.
    pub fn utilization(&self, dimension: Dimension) -> Option<f64> {
        let max = self.budget.limit(dimension)?;
        let used = self.usage.amount(dimension);
        if max <= 0.0 {
            return Some(if used > 0.0 { f64::INFINITY } else { 1.0 });
        }
        Some(used / max)
    }

    pub fn remaining(&self) -> RemainingBudget {
        let mut remaining = RemainingBudget::default();
        for (dimension, max) in self.budget.configured_dimensions() {
            let left = (max - self.usage.amount(dimension)).max(0.0);
            remaining.set(dimension, left);
        }
        remaining
    }

    /// Mean remaining fraction over configured dimensions, in `[0, 1]`.
    pub fn surplus_ratio(&self) -> f64 {
        let fractions: Vec<f64> = self
            .budget
            .configured_dimensions()
            .map(|(dimension, max)| {
                if max <= 0.0 {
                    return 0.0;
                }
                ((max - self.usage.amount(dimension)) / max).clamp(0.0, 1.0)
            })
            .collect();

        if fractions.is_empty() {
            return 1.0;
        }
        let mean = fractions.iter().sum::<f64>() / fractions.len() as f64;
        mean.clamp(0.0, 1.0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted_dimension().is_some()
    }

    /// First configured dimension whose usage reached its limit.
    pub fn exhausted_dimension(&self) -> Option<Dimension> {
        self.budget
            .configured_dimensions()
            .find(|(dimension, max)| self.usage.amount(*dimension) >= *max)
            .map(|(dimension, _)| dimension)
    }

    pub fn exhaustion_error(&self) -> Option<OrchestratorError> {
        let dimension = self.exhausted_dimension()?;
        let limit = self.budget.limit(dimension).unwrap_or_default();
        Some(OrchestratorError::BudgetExhausted {
            dimension,
            used: round2(self.usage.amount(dimension)),
            limit,
        })
    }

    /// Clears usage and warning memory for a new session.
    pub fn reset(&mut self) {
        self.usage = ResourceUsage::default();
        self.warned.clear();
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
