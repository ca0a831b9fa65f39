//! Session control loop.
//!
//! - `Orchestrator`: the state machine sequencing plan, gate, execute and verify
//! - `SessionOutcome`: terminal result with scores and usage
//! - `CancelHandle`: cooperative cancellation observed between iterations

mod engine;
mod outcome;
mod signal;

pub use engine::Orchestrator;
pub use outcome::{SessionFailure, SessionOutcome, SessionResult};
pub use signal::CancelHandle;
