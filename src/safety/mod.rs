//! Loop detection and rollback circuit breaker.

mod checkpoint;
mod git;
mod governor;

pub use checkpoint::{CheckpointId, CheckpointProvider, InMemoryCheckpoints};
pub use git::GitCheckpoints;
pub use governor::{
    LoopStatus, ResourceStatus, RollbackStatus, SafetyGovernor, SafetyStatus, SafetyVerdict,
};
