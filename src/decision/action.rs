use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::RiskTier;

/// Broad class of a side-effecting step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionCategory {
    Browser,
    FileSystem,
    ExternalApi,
    Financial,
    CodeExecution,
    DataDeletion,
    ConfigChange,
    Custom(String),
}

impl ActionCategory {
    pub fn base_risk(&self) -> RiskTier {
        match self {
            Self::Browser => RiskTier::Medium,
            Self::FileSystem => RiskTier::Medium,
            Self::ExternalApi => RiskTier::High,
            Self::Financial => RiskTier::Critical,
            Self::CodeExecution => RiskTier::High,
            Self::DataDeletion => RiskTier::Critical,
            Self::ConfigChange => RiskTier::Medium,
            Self::Custom(_) => RiskTier::Medium,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Browser => "browser",
            Self::FileSystem => "file_system",
            Self::ExternalApi => "external_api",
            Self::Financial => "financial",
            Self::CodeExecution => "code_execution",
            Self::DataDeletion => "data_deletion",
            Self::ConfigChange => "config_change",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for ActionCategory {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "browser" => Self::Browser,
            "filesystem" | "file_system" => Self::FileSystem,
            "external_api" | "api" => Self::ExternalApi,
            "financial" | "finance" => Self::Financial,
            "code_execution" | "code" => Self::CodeExecution,
            "data_deletion" | "delete" => Self::DataDeletion,
            "config_change" | "config" => Self::ConfigChange,
            _ => Self::Custom(value.to_string()),
        }
    }
}

impl From<String> for ActionCategory {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ActionCategory> for String {
    fn from(value: ActionCategory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A risky step attached to a unit of work that must clear the decision gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub id: String,
    pub category: ActionCategory,
    pub action_type: String,
    #[serde(default)]
    pub description: String,
    /// Monetary amount in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Explicit tier; derived from the category and details when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskTier>,
}

impl ProposedAction {
    pub fn new(category: impl Into<ActionCategory>, action_type: impl Into<String>) -> Self {
        Self {
            id: format!("act-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            category: category.into(),
            action_type: action_type.into(),
            description: String::new(),
            amount: None,
            target: None,
            risk: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_risk(mut self, risk: RiskTier) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk.unwrap_or_else(|| self.derived_risk())
    }

    fn derived_risk(&self) -> RiskTier {
        let base = self.category.base_risk();

        if let Some(amount) = self.amount {
            if amount >= 1000.0 {
                return RiskTier::Critical;
            }
            if amount >= 100.0 {
                return base.max(RiskTier::High);
            }
        }

        let elevated = matches!(
            self.action_type.to_lowercase().as_str(),
            "delete"
                | "remove"
                | "destroy"
                | "purchase"
                | "buy"
                | "pay"
                | "execute"
                | "run"
                | "eval"
                | "publish"
                | "deploy"
                | "release"
        );
        if elevated {
            return base.max(RiskTier::High);
        }

        base
    }

    /// Short label used in prompts and error messages.
    pub fn label(&self) -> String {
        match &self.target {
            Some(target) => format!("{}:{} {}", self.category, self.action_type, target),
            None => format!("{}:{}", self.category, self.action_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_risk_by_category() {
        assert_eq!(
            ProposedAction::new("browser", "navigate").risk_tier(),
            RiskTier::Medium
        );
        assert_eq!(
            ProposedAction::new("external_api", "get").risk_tier(),
            RiskTier::High
        );
        assert_eq!(
            ProposedAction::new("financial", "quote").risk_tier(),
            RiskTier::Critical
        );
    }

    #[test]
    fn test_action_type_elevates_to_high() {
        let action = ProposedAction::new("file_system", "delete");
        assert_eq!(action.risk_tier(), RiskTier::High);
        let action = ProposedAction::new("config", "Deploy");
        assert_eq!(action.risk_tier(), RiskTier::High);
    }

    #[test]
    fn test_amount_elevation() {
        let action = ProposedAction::new("browser", "purchase").with_amount(1500.0);
        assert_eq!(action.risk_tier(), RiskTier::Critical);
        let action = ProposedAction::new("browser", "checkout").with_amount(150.0);
        assert_eq!(action.risk_tier(), RiskTier::High);
        let action = ProposedAction::new("browser", "checkout").with_amount(15.0);
        assert_eq!(action.risk_tier(), RiskTier::Medium);
    }

    #[test]
    fn test_declared_risk_wins() {
        let action = ProposedAction::new("data_deletion", "purge").with_risk(RiskTier::Low);
        assert_eq!(action.risk_tier(), RiskTier::Low);
    }

    #[test]
    fn test_category_aliases_and_custom() {
        assert_eq!(ActionCategory::from("api"), ActionCategory::ExternalApi);
        assert_eq!(ActionCategory::from("FileSystem"), ActionCategory::FileSystem);
        assert_eq!(
            ActionCategory::from("telemetry"),
            ActionCategory::Custom("telemetry".into())
        );
        let json = serde_json::to_string(&ActionCategory::CodeExecution).unwrap();
        assert_eq!(json, "\"code_execution\"");
    }
}
