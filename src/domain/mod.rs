//! Core domain types shared by every component.
//!
//! - `AutonomyLevel`, `RiskTier`, `LevelPolicy`: the strictness vocabulary
//! - `OrchestratorState`, `StateTransition`: the session state machine
//! - `SessionContext`: immutable per-run identity

mod autonomy;
mod session;
mod state;

pub use autonomy::{AutonomyLevel, LevelPolicy, RiskTier, UnattendedDefault};
pub use session::{SessionContext, new_session_id};
pub use state::{OrchestratorState, StateTransition};
