mod fixtures;

use std::sync::Arc;

use autonomy_engine::budget::ResourceBudget;
use autonomy_engine::config::OrchestratorConfig;
use autonomy_engine::domain::AutonomyLevel;
use autonomy_engine::error::ErrorKind;
use autonomy_engine::executor::ExecutionReport;
use autonomy_engine::orchestrator::Orchestrator;
use autonomy_engine::safety::{CheckpointId, InMemoryCheckpoints};

use fixtures::{ScriptedExecutor, assert_scores_in_range};

fn config() -> OrchestratorConfig {
    OrchestratorConfig::new(AutonomyLevel::Insane, ResourceBudget::unbounded())
}

fn catastrophe() -> ExecutionReport {
    ExecutionReport::failure("wiped the build directory").catastrophic()
}

#[tokio::test]
async fn test_catastrophic_failure_rolls_back_to_last_good_state() {
    let checkpoints = InMemoryCheckpoints::new();
    let executor = Arc::new(ScriptedExecutor::reports(vec![
        ExecutionReport::success(),
        catastrophe(),
        ExecutionReport::success().satisfied(),
    ]));
    let mut orch = Orchestrator::new(config(), executor)
        .with_checkpoints(Arc::new(checkpoints.clone()));

    let outcome = orch.process("refactor the build").await.unwrap();

    assert!(outcome.success);
    // mem-1 at session start, mem-2 after the first successful unit.
    assert_eq!(
        checkpoints.restored(),
        vec![CheckpointId("mem-2".into())]
    );
    let status = orch.safety_status();
    assert_eq!(status.rollbacks.count, 1);
    assert!(status.safe);
}

#[tokio::test]
async fn test_catastrophic_failure_without_provider_trips() {
    let executor = Arc::new(ScriptedExecutor::repeating(catastrophe()));
    let mut orch = Orchestrator::new(config(), executor.clone());

    let outcome = orch.process("no safety net").await.unwrap();

    assert_eq!(outcome.error_kind(), Some(ErrorKind::SafetyTripped));
    assert_eq!(executor.calls(), 1);
    let status = orch.safety_status();
    assert!(!status.safe);
    assert!(status.reason.unwrap().contains("checkpoint"));
}

#[tokio::test]
async fn test_failed_restore_trips() {
    let executor = Arc::new(ScriptedExecutor::repeating(catastrophe()));
    let mut orch = Orchestrator::new(config(), executor)
        .with_checkpoints(Arc::new(InMemoryCheckpoints::failing()));

    let outcome = orch.process("broken restore").await.unwrap();

    let failure = outcome.error.unwrap();
    assert_eq!(failure.kind, ErrorKind::SafetyTripped);
    assert!(failure.reason.contains("rollback"), "{}", failure.reason);
}

#[tokio::test]
async fn test_rollback_limit_trips() {
    let checkpoints = InMemoryCheckpoints::new();
    let executor = Arc::new(ScriptedExecutor::repeating(catastrophe()));
    let mut config = config();
    config.safety.max_rollbacks = 2;
    let mut orch = Orchestrator::new(config, executor.clone())
        .with_checkpoints(Arc::new(checkpoints.clone()));

    let outcome = orch.process("keeps exploding").await.unwrap();

    assert_eq!(outcome.error_kind(), Some(ErrorKind::SafetyTripped));
    assert_eq!(checkpoints.restored().len(), 2);
    assert_eq!(executor.calls(), 3);
}

#[tokio::test]
async fn test_loop_break_limit_trips() {
    let executor = Arc::new(ScriptedExecutor::repeating(ExecutionReport::failure("stuck")));
    let mut config = config();
    config.safety.loop_threshold = 2;
    config.safety.max_loop_breaks = 2;
    let mut orch = Orchestrator::new(config, executor.clone());

    let outcome = orch.process("hopeless").await.unwrap();

    let failure = outcome.error.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::SafetyTripped);
    assert_eq!(orch.safety_status().loops.loops_broken, 3);
    assert_eq!(executor.calls(), 6);

    let signatures: Vec<String> = executor
        .executed()
        .into_iter()
        .map(|u| u.signature)
        .collect();
    assert_eq!(
        signatures,
        vec![
            "approach-0",
            "approach-0",
            "approach-1",
            "approach-1",
            "approach-2",
            "approach-2"
        ]
    );
    assert_scores_in_range(&failure.partial);
}

#[tokio::test]
async fn test_scores_stay_in_range_for_mixed_session() {
    let executor = Arc::new(ScriptedExecutor::reports(vec![
        ExecutionReport::failure("red").with_tests(10, 2),
        ExecutionReport::success().with_tests(10, 10),
        ExecutionReport::failure("flaky"),
        ExecutionReport::success().with_tests(12, 12).satisfied(),
    ]));
    let mut orch = Orchestrator::new(config(), executor);

    let outcome = orch.process("stabilise the suite").await.unwrap();

    let result = outcome.result.unwrap();
    assert_scores_in_range(&result);
    assert_eq!(result.quality_score, result.quality.overall);
    assert_eq!(result.craziness_score, result.craziness.overall);
    assert_eq!(result.craziness.level, AutonomyLevel::Insane);
}
