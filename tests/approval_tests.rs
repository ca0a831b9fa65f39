mod fixtures;

use std::sync::Arc;
use std::time::{Duration, Instant};

use autonomy_engine::budget::ResourceBudget;
use autonomy_engine::config::OrchestratorConfig;
use autonomy_engine::decision::{DecisionType, ProposedAction, RejectionPolicy};
use autonomy_engine::domain::{AutonomyLevel, OrchestratorState, RiskTier};
use autonomy_engine::error::ErrorKind;
use autonomy_engine::executor::ExecutionReport;
use autonomy_engine::notification::OrchestratorEvent;
use autonomy_engine::orchestrator::Orchestrator;

use fixtures::{RecordingBus, ScriptedChannel, ScriptedExecutor};

fn risky(risk: RiskTier) -> ProposedAction {
    ProposedAction::new("code_execution", "run_migration")
        .with_description("apply pending database migrations")
        .with_risk(risk)
}

fn attended(level: AutonomyLevel, timeout_ms: u64) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::new(level, ResourceBudget::unbounded());
    config.decision.approval_timeout_ms = timeout_ms;
    config
}

fn path(orch: &Orchestrator) -> Vec<OrchestratorState> {
    orch.transitions().iter().map(|t| t.to).collect()
}

fn decisions(bus: &RecordingBus) -> Vec<(DecisionType, bool)> {
    bus.events()
        .into_iter()
        .filter_map(|e| match e {
            OrchestratorEvent::DecisionMade { kind, approved, .. } => Some((kind, approved)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_silent_human_times_out_and_fails() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::Medium)),
    );
    let channel = Arc::new(ScriptedChannel::silent());
    let bus = RecordingBus::new();
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Timid, 50), executor.clone())
        .with_human_channel(channel.clone())
        .with_event_bus(bus.clone());

    let outcome = orch.process("migrate the database").await.unwrap();

    use OrchestratorState::*;
    assert_eq!(path(&orch), vec![Planning, AwaitingApproval, Failed]);
    assert!(!outcome.success);
    let failure = outcome.error.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::DecisionTimeout);
    assert!(failure.reason.contains("timed out"), "{}", failure.reason);
    assert_eq!(channel.asked(), 1);
    assert_eq!(executor.calls(), 0);
    assert_eq!(decisions(&bus), vec![(DecisionType::Timeout, false)]);
}

#[tokio::test]
async fn test_unattended_default_is_deterministic_per_level() {
    for level in AutonomyLevel::ALL {
        let executor = Arc::new(
            ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
                .with_action(risky(RiskTier::High)),
        );
        let config = OrchestratorConfig::new(level, ResourceBudget::unbounded()).unattended(true);
        let mut orch = Orchestrator::new(config, executor.clone());

        let outcome = orch.process("deploy").await.unwrap();

        let approves = matches!(
            level,
            AutonomyLevel::Lunatic | AutonomyLevel::Insane | AutonomyLevel::Crazy
        );
        assert_eq!(outcome.success, approves, "level {}", level);
        if approves {
            assert_eq!(executor.calls(), 1, "level {}", level);
        } else {
            assert_eq!(
                outcome.error_kind(),
                Some(ErrorKind::DecisionRejected),
                "level {}",
                level
            );
            assert_eq!(executor.calls(), 0, "level {}", level);
        }
    }
}

#[tokio::test]
async fn test_auto_approval_under_threshold_never_asks() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::Medium)),
    );
    let channel = Arc::new(ScriptedChannel::reject());
    let bus = RecordingBus::new();
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Crazy, 1_000), executor)
        .with_human_channel(channel.clone())
        .with_event_bus(bus.clone());

    let outcome = orch.process("edit a config file").await.unwrap();

    assert!(outcome.success);
    assert_eq!(channel.asked(), 0);
    assert_eq!(decisions(&bus), vec![(DecisionType::Auto, true)]);
    assert_eq!(orch.metrics().decisions.auto_approved, 1);
}

#[tokio::test]
async fn test_human_approval_resumes_planning() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::Critical)),
    );
    let channel = Arc::new(ScriptedChannel::approve());
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Timid, 1_000), executor.clone())
        .with_human_channel(channel.clone());

    let outcome = orch.process("drop the staging table").await.unwrap();

    use OrchestratorState::*;
    assert!(outcome.success);
    assert_eq!(
        path(&orch),
        vec![Planning, AwaitingApproval, Planning, Executing, Verifying, Completed]
    );
    assert_eq!(channel.asked(), 1);
    assert_eq!(executor.calls(), 1);
    let decisions = orch.metrics().decisions;
    assert_eq!(decisions.total, 1);
    assert_eq!(decisions.approved, 1);
    assert_eq!(decisions.escalated, 1);
}

#[tokio::test]
async fn test_human_rejection_fails_session() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::High)),
    );
    let channel = Arc::new(ScriptedChannel::reject());
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Bold, 1_000), executor.clone())
        .with_human_channel(channel);

    let outcome = orch.process("call the payments API").await.unwrap();

    use OrchestratorState::*;
    assert_eq!(path(&orch), vec![Planning, AwaitingApproval, Failed]);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DecisionRejected));
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_no_channel_applies_level_default() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::Critical)),
    );
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Crazy, 1_000), executor.clone());

    let outcome = orch.process("nobody is watching").await.unwrap();

    assert!(outcome.success);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_look_ahead_unit_awaits_approval_after_verify() {
    let executor = Arc::new(
        ScriptedExecutor::reports(vec![
            ExecutionReport::success(),
            ExecutionReport::success().satisfied(),
        ])
        .with_action_at(&[2], risky(RiskTier::High)),
    );
    let channel = Arc::new(ScriptedChannel::approve());
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Wild, 1_000), executor.clone())
        .with_human_channel(channel.clone());

    let outcome = orch.process("two phase rollout").await.unwrap();

    use OrchestratorState::*;
    assert!(outcome.success);
    assert_eq!(
        path(&orch),
        vec![
            Planning,
            Executing,
            Verifying,
            AwaitingApproval,
            Planning,
            Executing,
            Verifying,
            Completed
        ]
    );
    assert_eq!(channel.asked(), 1);
    let executed = executor.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[1].action.is_some());
}

fn cancel_after(orch: &Orchestrator, delay: Duration) {
    let cancel = orch.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        cancel.cancel();
    });
}

#[tokio::test]
async fn test_cancel_during_execution_skips_risky_look_ahead() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success())
            .with_action_at(&[2], risky(RiskTier::Medium))
            .with_delay(Duration::from_millis(100)),
    );
    let channel = Arc::new(ScriptedChannel::silent());
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Timid, 5_000), executor.clone())
        .with_human_channel(channel.clone());
    cancel_after(&orch, Duration::from_millis(30));

    let started = Instant::now();
    let outcome = orch.process("migrate then verify").await.unwrap();

    use OrchestratorState::*;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
    assert_eq!(path(&orch), vec![Planning, Executing, Verifying, Failed]);
    assert_eq!(channel.asked(), 0);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_cancel_while_awaiting_look_ahead_approval() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success())
            .with_action_at(&[2], risky(RiskTier::Medium))
            .with_delay(Duration::from_millis(10)),
    );
    let channel = Arc::new(ScriptedChannel::silent());
    let bus = RecordingBus::new();
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Timid, 10_000), executor.clone())
        .with_human_channel(channel.clone())
        .with_event_bus(bus.clone());
    cancel_after(&orch, Duration::from_millis(200));

    let started = Instant::now();
    let outcome = orch.process("migrate then verify").await.unwrap();

    use OrchestratorState::*;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
    assert_eq!(
        path(&orch),
        vec![Planning, Executing, Verifying, AwaitingApproval, Failed]
    );
    assert_eq!(channel.asked(), 1);
    assert!(decisions(&bus).is_empty());
}

#[tokio::test]
async fn test_cancel_while_awaiting_first_approval() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::Medium)),
    );
    let channel = Arc::new(ScriptedChannel::silent());
    let mut orch = Orchestrator::new(attended(AutonomyLevel::Timid, 10_000), executor.clone())
        .with_human_channel(channel.clone());
    cancel_after(&orch, Duration::from_millis(50));

    let outcome = tokio::time::timeout(Duration::from_secs(5), orch.process("migrate"))
        .await
        .expect("cancellation should end the wait")
        .unwrap();

    use OrchestratorState::*;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
    assert_eq!(path(&orch), vec![Planning, AwaitingApproval, Failed]);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_skip_policy_drops_rejected_unit() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action_at(&[1], risky(RiskTier::High)),
    );
    let mut config =
        OrchestratorConfig::new(AutonomyLevel::Wild, ResourceBudget::unbounded()).unattended(true);
    config.decision.rejection_policy = RejectionPolicy::Skip;
    let mut orch = Orchestrator::new(config, executor.clone());

    let outcome = orch.process("try something safer").await.unwrap();

    assert!(outcome.success);
    assert_eq!(orch.iteration(), 2);
    let executed = executor.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].id, "unit-2");
    assert!(executed[0].action.is_none());
}

#[tokio::test]
async fn test_skipping_every_unit_trips_the_governor() {
    let executor = Arc::new(
        ScriptedExecutor::repeating(ExecutionReport::success().satisfied())
            .with_action(risky(RiskTier::Critical)),
    );
    let mut config =
        OrchestratorConfig::new(AutonomyLevel::Bold, ResourceBudget::unbounded()).unattended(true);
    config.decision.rejection_policy = RejectionPolicy::Skip;
    config.safety.max_loop_breaks = 1;
    let mut orch = Orchestrator::new(config, executor.clone());

    let outcome = orch.process("impossible").await.unwrap();

    assert_eq!(outcome.error_kind(), Some(ErrorKind::SafetyTripped));
    assert_eq!(orch.iteration(), 6);
    assert_eq!(executor.calls(), 0);
    assert_eq!(orch.safety_status().resources.usage.actions, 6);
}
