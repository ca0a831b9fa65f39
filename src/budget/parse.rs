use std::collections::HashSet;
use std::str::FromStr;

use super::types::ResourceBudget;
use crate::error::{OrchestratorError, Result};

/// Parses `"tokens:<int>,cost:<float>,time:<seconds>"`.
///
/// `files:<int>` and `actions:<int>` are also accepted. Keys may appear at
/// most once; whitespace around keys and values is ignored. `time` is given in
/// seconds and stored as minutes.
impl FromStr for ResourceBudget {
    type Err = OrchestratorError;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(OrchestratorError::InvalidBudget(
                "budget string is empty".into(),
            ));
        }

        let mut budget = ResourceBudget::default();
        let mut seen = HashSet::new();

        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((key, value)) = part.split_once(':') else {
                return Err(OrchestratorError::InvalidBudget(format!(
                    "expected key:value, got '{}'",
                    part
                )));
            };
            let key = key.trim();
            let value = value.trim();

            if !seen.insert(key.to_string()) {
                return Err(OrchestratorError::InvalidBudget(format!(
                    "duplicate key '{}'",
                    key
                )));
            }

            match key {
                "tokens" => budget.max_tokens = Some(parse_count(key, value)?),
                "cost" => budget.max_cost_usd = Some(parse_amount(key, value)?),
                "time" => budget.max_duration_minutes = Some(parse_amount(key, value)? / 60.0),
                "files" => budget.max_files_changed = Some(parse_count(key, value)?),
                "actions" => budget.max_actions = Some(parse_count(key, value)?),
                other => {
                    return Err(OrchestratorError::InvalidBudget(format!(
                        "unknown key '{}' (expected tokens, cost, time, files, actions)",
                        other
                    )));
                }
            }
        }

        Ok(budget)
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        OrchestratorError::InvalidBudget(format!(
            "'{}' must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}

fn parse_amount(key: &str, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(OrchestratorError::InvalidBudget(format!(
            "'{}' must be a non-negative number, got '{}'",
            key, value
        ))),
    }
}

/// Resolves the effective budget once per dimension.
///
/// Precedence: explicit flags, then the budget string, then the config file,
/// then [`ResourceBudget::hard_defaults`].
pub fn resolve_budget(
    flags: &ResourceBudget,
    budget_string: Option<&str>,
    file: &ResourceBudget,
) -> Result<ResourceBudget> {
    let from_string = match budget_string {
        Some(s) => s.parse::<ResourceBudget>()?,
        None => ResourceBudget::default(),
    };

    let resolved = flags
        .clone()
        .or(&from_string)
        .or(file)
        .or(&ResourceBudget::hard_defaults());
    resolved.validate()?;
    Ok(resolved)
}
