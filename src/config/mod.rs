//! Configuration types and loading.
//!
//! - `EngineConfig`: the `autonomy.toml` file with validation
//! - `OrchestratorConfig`: the immutable per-session view handed to the core

mod session;
mod settings;

pub use session::OrchestratorConfig;
pub use settings::{
    BudgetConfig, CONFIG_FILE_NAME, DecisionConfig, EngineConfig, NotificationConfig,
    QualityWeights, SafetyConfig, ScoringConfig, SessionConfig,
};
