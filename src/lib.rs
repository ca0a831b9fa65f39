pub mod budget;
pub mod cli;
pub mod config;
pub mod decision;
pub mod domain;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod notification;
pub mod orchestrator;
pub mod output;
pub mod safety;
pub mod scoring;

pub use budget::{ResourceBudget, ResourceDelta, ResourceTracker};
pub use config::{EngineConfig, OrchestratorConfig};
pub use decision::{DecisionGate, HumanChannel, ProposedAction};
pub use domain::{AutonomyLevel, OrchestratorState, RiskTier};
pub use error::{OrchestratorError, Result};
pub use executor::{ExecutionReport, TaskExecutor, UnitOfWork};
pub use notification::{EventBus, InMemoryEventBus, OrchestratorEvent};
pub use orchestrator::{CancelHandle, Orchestrator, SessionOutcome};
pub use safety::{CheckpointProvider, SafetyGovernor};
