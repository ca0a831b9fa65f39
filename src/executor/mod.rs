//! Task execution capability consumed by the orchestrator.
//!
//! - `TaskExecutor`: plans and performs units of work
//! - `CommandExecutor`: runs a shell command per unit

mod command;
mod traits;
mod types;

pub use command::CommandExecutor;
pub use traits::TaskExecutor;
pub use types::{ExecutionReport, PlanContext, TddPhase, TestCounts, UnitOfWork};
