//! Resource accounting against configured limits.

mod parse;
mod tracker;
mod types;

pub use parse::resolve_budget;
pub use tracker::{DEFAULT_WARNING_RATIO, ResourceTracker};
pub use types::{
    Dimension, RemainingBudget, ResourceBudget, ResourceDelta, ResourceUsage, ResourceWarning,
};
