//! Human-in-the-loop decision gate.
//!
//! Each risky unit carries a [`ProposedAction`]. The gate compares its risk
//! tier with the autonomy level's threshold and either approves it, applies the
//! unattended default, or asks a [`HumanChannel`] under a timeout.

mod action;
mod gate;

pub use action::{ActionCategory, ProposedAction};
pub use gate::{
    ApprovalRequest, Decision, DecisionGate, DecisionType, GateOutcome, HumanChannel,
    HumanVerdict, RejectionPolicy, evaluate,
};
