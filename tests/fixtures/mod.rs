//! Shared doubles for driving the orchestrator in integration tests.
#![allow(dead_code)]

pub mod bus;
pub mod executor;
pub mod human;

pub use bus::RecordingBus;
pub use executor::ScriptedExecutor;
pub use human::ScriptedChannel;

use autonomy_engine::orchestrator::SessionResult;

/// Asserts every score of `result` lies in `[0, 100]`.
pub fn assert_scores_in_range(result: &SessionResult) {
    let q = &result.quality;
    let c = &result.craziness;
    for (name, value) in [
        ("quality", q.overall),
        ("test_coverage", q.test_coverage),
        ("code_quality", q.code_quality),
        ("decision_quality", q.decision_quality),
        ("efficiency", q.efficiency),
        ("safety", q.safety),
        ("craziness", c.overall),
        ("autonomy", c.autonomy),
        ("self_correction", c.self_correction),
        ("speed", c.speed),
        ("risk_taking", c.risk_taking),
    ] {
        assert!(
            (0.0..=100.0).contains(&value),
            "{} out of range: {}",
            name,
            value
        );
    }
}
