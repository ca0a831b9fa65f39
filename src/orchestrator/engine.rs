use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::outcome::{SessionFailure, SessionOutcome, SessionResult};
use super::signal::CancelHandle;
use crate::budget::{ResourceDelta, ResourceTracker, ResourceWarning};
use crate::config::OrchestratorConfig;
use crate::decision::{
    ApprovalRequest, Decision, DecisionGate, DecisionType, HumanChannel, RejectionPolicy,
};
use crate::domain::{OrchestratorState, SessionContext, StateTransition};
use crate::error::{ErrorKind, OrchestratorError, Result};
use crate::executor::{ExecutionReport, PlanContext, TaskExecutor, UnitOfWork};
use crate::metrics::{MetricsCollector, SessionMetrics};
use crate::notification::{
    EventBus, FnHandler, InMemoryEventBus, OrchestratorEvent, Subscription,
};
use crate::safety::{CheckpointProvider, SafetyGovernor, SafetyStatus, SafetyVerdict};
use crate::scoring::{ScoringEngine, Scores};

/// What the decision gate did with a planned unit.
enum Clearance {
    Proceed(UnitOfWork),
    /// Rejected under the skip policy. Back in `Planning`.
    Skipped,
    /// The session has failed.
    Failed,
}

/// Drives one session from `Idle` to `Completed` or `Failed`.
///
/// Every instance owns its own tracker, governor, collector, scoring engine and
/// event bus, so independent sessions never share state.
pub struct Orchestrator {
    config: OrchestratorConfig,
    executor: Arc<dyn TaskExecutor>,
    bus: Arc<dyn EventBus>,
    gate: DecisionGate,
    tracker: ResourceTracker,
    governor: SafetyGovernor,
    metrics: MetricsCollector,
    scoring: ScoringEngine,
    cancel: CancelHandle,
    cancel_subscription: Option<Subscription>,
    pinned_session_id: Option<String>,
    session: Option<SessionContext>,
    state: OrchestratorState,
    transitions: Vec<StateTransition>,
    iteration: u32,
    scores: Scores,
    next_unit: Option<UnitOfWork>,
    last_report: Option<ExecutionReport>,
    last_output: Option<String>,
    last_charge: Option<Instant>,
    failure: Option<(ErrorKind, String)>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        let gate = DecisionGate::new(
            config.autonomy_level,
            config.level_policy(),
            config.unattended,
            Duration::from_millis(config.decision.approval_timeout_ms),
        );
        let tracker =
            ResourceTracker::with_warning_ratio(config.resource_budget.clone(), config.warning_ratio);
        let governor = SafetyGovernor::new(config.safety.clone());
        let scoring = ScoringEngine::new(config.scoring.clone(), config.autonomy_level);
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new(config.event_channel_capacity));

        Self {
            config,
            executor,
            bus,
            gate,
            tracker,
            governor,
            metrics: MetricsCollector::new(),
            scoring,
            cancel: CancelHandle::new(),
            cancel_subscription: None,
            pinned_session_id: None,
            session: None,
            state: OrchestratorState::Idle,
            transitions: Vec::new(),
            iteration: 0,
            scores: Scores::default(),
            next_unit: None,
            last_report: None,
            last_output: None,
            last_charge: None,
            failure: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_checkpoints(mut self, provider: Arc<dyn CheckpointProvider>) -> Self {
        self.governor.set_provider(Some(provider));
        self
    }

    pub fn with_human_channel(mut self, channel: Arc<dyn HumanChannel>) -> Self {
        self.gate.set_channel(Some(channel));
        self
    }

    /// Uses `session_id` instead of a generated one.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.pinned_session_id = Some(session_id.into());
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn safety_status(&self) -> SafetyStatus {
        self.governor.status(&self.tracker)
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.snapshot()
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    /// Creates the session and enters `Planning`.
    pub async fn start(&mut self, request: &str) -> Result<()> {
        if let Some(session) = &self.session {
            return Err(OrchestratorError::AlreadyStarted {
                session_id: session.session_id().to_string(),
            });
        }
        self.config.resource_budget.validate()?;
        let session = SessionContext::new(request, self.pinned_session_id.clone())?;
        let session_id = session.session_id().to_string();
        self.session = Some(session);

        self.tracker.reset();
        self.governor.reset();
        self.metrics.reset();
        self.scoring.reset();
        self.last_charge = Some(Instant::now());

        let status = self.safety_status();
        let metrics = self.metrics.snapshot();
        self.scores = self.scoring.clone().compute(&status, &metrics);
        self.cancel_subscription = Some(self.subscribe_cancel(&session_id));

        info!(
            session_id = %session_id,
            autonomy_level = %self.config.autonomy_level,
            unattended = self.config.unattended,
            "Session started"
        );
        self.publish(OrchestratorEvent::SessionStarted {
            session_id,
            autonomy_level: self.config.autonomy_level,
        });
        self.transition(OrchestratorState::Planning, "Session started")?;
        self.governor.mark_known_good().await;
        Ok(())
    }

    /// Runs the session to a terminal state.
    ///
    /// Starts the session first unless [`start`](Self::start) was already
    /// called, in which case `request` is ignored. Only hard failures are
    /// returned as `Err`; every other ending is described by the outcome.
    pub async fn process(&mut self, request: &str) -> Result<SessionOutcome> {
        if self.session.is_none() {
            self.start(request).await?;
        } else if self.state.is_terminal() {
            return Err(OrchestratorError::AlreadyStarted {
                session_id: self.session_id().to_string(),
            });
        }

        let result = self.run().await;
        self.cancel_subscription.take();
        result?;
        Ok(self.outcome())
    }

    async fn run(&mut self) -> Result<()> {
        while !self.state.is_terminal() {
            // Lets bus subscribers run even when the executor never suspends.
            tokio::task::yield_now().await;
            self.charge(ResourceDelta::new())?;
            if let Some(error) = self.boundary_error() {
                self.fail(&error)?;
                break;
            }

            self.iteration += 1;
            self.metrics.record_iteration();
            debug!(session_id = %self.session_id(), iteration = self.iteration, "Iteration started");
            self.publish(OrchestratorEvent::IterationStarted {
                session_id: self.session_id().to_string(),
                iteration: self.iteration,
            });

            let unit = match self.next_unit.take() {
                Some(unit) => unit,
                None => {
                    let unit = self.plan_unit(self.iteration).await;
                    match self.clear_unit(unit).await? {
                        Clearance::Proceed(unit) => unit,
                        Clearance::Skipped | Clearance::Failed => continue,
                    }
                }
            };

            let report = self.execute_unit(&unit).await?;
            self.verify(unit, report).await?;
        }
        Ok(())
    }

    fn boundary_error(&self) -> Option<OrchestratorError> {
        if self.cancel.is_cancelled() {
            return Some(OrchestratorError::Cancelled);
        }
        self.governor
            .trip_error()
            .or_else(|| self.tracker.exhaustion_error())
    }

    async fn plan_unit(&self, iteration: u32) -> UnitOfWork {
        let request = self.session.as_ref().map(|s| s.request()).unwrap_or_default();
        let ctx = PlanContext {
            session_id: self.session_id(),
            request,
            iteration,
            loops_broken: self.governor.loops_broken(),
            abandoned_signatures: self.governor.abandoned_signatures(),
            last_report: self.last_report.as_ref(),
        };

        match self.executor.plan(&ctx).await {
            Ok(unit) => unit,
            Err(e) => {
                warn!(iteration, error = %e, "Planning failed, using default unit");
                ctx.default_unit()
            }
        }
    }

    /// Routes a risky unit through the decision gate.
    async fn clear_unit(&mut self, unit: UnitOfWork) -> Result<Clearance> {
        let Some(action) = unit.action.clone() else {
            return Ok(Clearance::Proceed(unit));
        };

        let decision = match self.gate.evaluate(&action).decision() {
            Some(decision) => decision,
            None => {
                self.transition(
                    OrchestratorState::AwaitingApproval,
                    &format!("Approval required for {}", action.label()),
                )?;
                let request = ApprovalRequest {
                    session_id: self.session_id().to_string(),
                    unit_id: unit.id.clone(),
                    autonomy_level: self.config.autonomy_level,
                    action: action.clone(),
                    timeout_ms: self.config.decision.approval_timeout_ms,
                };
                let answer = tokio::select! {
                    decision = self.gate.ask_human(&request) => Some(decision),
                    _ = self.cancel.cancelled() => None,
                };
                match answer {
                    Some(decision) => decision,
                    None => {
                        info!(unit_id = %unit.id, "Approval abandoned, session cancelled");
                        self.fail(&OrchestratorError::Cancelled)?;
                        return Ok(Clearance::Failed);
                    }
                }
            }
        };
        if self.cancel.is_cancelled() {
            self.fail(&OrchestratorError::Cancelled)?;
            return Ok(Clearance::Failed);
        }
        self.record_decision(decision);

        if decision.approved {
            if self.state == OrchestratorState::AwaitingApproval {
                self.transition(OrchestratorState::Planning, "Action approved")?;
            }
            return Ok(Clearance::Proceed(unit));
        }

        match self.config.decision.rejection_policy {
            RejectionPolicy::Skip => {
                info!(unit_id = %unit.id, action = %action.label(), "Rejected unit skipped");
                if self.state != OrchestratorState::Planning {
                    self.transition(OrchestratorState::Planning, "Rejected unit skipped")?;
                }
                self.charge(ResourceDelta::new().actions(1))?;
                // Repeated skips of one signature count as a loop.
                self.governor
                    .evaluate(&unit, &ExecutionReport::failure("action rejected"))
                    .await;
                if let Some(error) = self.governor.trip_error() {
                    self.fail(&error)?;
                    return Ok(Clearance::Failed);
                }
                Ok(Clearance::Skipped)
            }
            RejectionPolicy::Fail => {
                let error = if decision.kind == DecisionType::Timeout {
                    OrchestratorError::DecisionTimeout {
                        action: action.label(),
                        timeout_ms: self.config.decision.approval_timeout_ms,
                    }
                } else {
                    OrchestratorError::DecisionRejected {
                        action: action.label(),
                    }
                };
                self.fail(&error)?;
                Ok(Clearance::Failed)
            }
        }
    }

    async fn execute_unit(&mut self, unit: &UnitOfWork) -> Result<ExecutionReport> {
        self.transition(
            OrchestratorState::Executing,
            &format!("Executing {}", unit.id),
        )?;
        self.publish(OrchestratorEvent::TaskStarted {
            session_id: self.session_id().to_string(),
            task_id: unit.id.clone(),
        });

        let report = match self.executor.execute(unit).await {
            Ok(report) => report,
            Err(e) => {
                warn!(unit_id = %unit.id, error = %e, "Executor failed");
                ExecutionReport::failure(e.to_string())
            }
        };
        debug!(
            unit_id = %unit.id,
            success = report.success,
            satisfied = report.request_satisfied,
            "Unit executed"
        );

        self.publish(OrchestratorEvent::TaskCompleted {
            session_id: self.session_id().to_string(),
            task_id: unit.id.clone(),
            success: report.success,
        });
        let reason = if report.success {
            "Unit succeeded"
        } else {
            "Unit failed"
        };
        self.transition(OrchestratorState::Verifying, reason)?;
        Ok(report)
    }

    async fn verify(&mut self, unit: UnitOfWork, report: ExecutionReport) -> Result<()> {
        if let Err(error) = report.resource_delta.validate() {
            error!(
                session_id = %self.session_id(),
                unit_id = %unit.id,
                error = %error,
                "Executor reported an invalid resource delta"
            );
            self.fail(&error)?;
            return Err(error);
        }
        self.charge(report.resource_delta.plus(ResourceDelta::new().actions(1)))?;
        self.metrics.record_task(&report);

        let verdict = self.governor.evaluate(&unit, &report).await;
        self.refresh_scores();

        if report.output.is_some() {
            self.last_output = report.output.clone();
        }
        let satisfied = report.success && report.request_satisfied;
        self.last_report = Some(report);

        if let Some(error) = self.governor.trip_error() {
            return self.fail(&error);
        }
        if satisfied {
            return self.complete();
        }
        if let Some(error) = self.tracker.exhaustion_error() {
            return self.fail(&error);
        }

        match verdict {
            SafetyVerdict::LoopBroken { signature } => {
                info!(signature = %signature, "Replanning after loop break");
            }
            SafetyVerdict::RolledBack { checkpoint } => {
                info!(checkpoint = %checkpoint, "Replanning after rollback");
            }
            SafetyVerdict::Continue | SafetyVerdict::Tripped { .. } => {}
        }

        if self.cancel.is_cancelled() {
            return self.fail(&OrchestratorError::Cancelled);
        }
        let next = self.plan_unit(self.iteration + 1).await;
        if let Clearance::Proceed(next) = self.clear_unit(next).await? {
            if self.state == OrchestratorState::Verifying {
                self.transition(OrchestratorState::Planning, "More work remains")?;
            }
            self.next_unit = Some(next);
        }
        Ok(())
    }

    /// Records `delta` plus the wall-clock time since the previous charge.
    fn charge(&mut self, delta: ResourceDelta) -> Result<()> {
        let now = Instant::now();
        let elapsed = self
            .last_charge
            .map(|at| now.duration_since(at))
            .unwrap_or_default();
        self.last_charge = Some(now);

        let delta = delta.plus(ResourceDelta::new().duration_ms(elapsed.as_millis() as i64));
        for warning in self.tracker.record(&delta)? {
            self.publish_warning(warning);
        }
        Ok(())
    }

    fn publish_warning(&self, warning: ResourceWarning) {
        warn!(
            session_id = %self.session_id(),
            dimension = %warning.resource,
            percentage = warning.percentage,
            "Resource budget warning"
        );
        self.publish(OrchestratorEvent::ResourceWarning {
            session_id: self.session_id().to_string(),
            resource: warning.resource,
            percentage: warning.percentage,
        });
    }

    fn record_decision(&mut self, decision: Decision) {
        self.metrics.record_decision(&decision);
        info!(
            session_id = %self.session_id(),
            kind = %decision.kind,
            approved = decision.approved,
            "Decision made"
        );
        self.publish(OrchestratorEvent::DecisionMade {
            session_id: self.session_id().to_string(),
            kind: decision.kind,
            approved: decision.approved,
        });
    }

    fn refresh_scores(&mut self) {
        let status = self.safety_status();
        let metrics = self.metrics.snapshot();
        self.scores = self.scoring.compute(&status, &metrics);
        self.publish(OrchestratorEvent::MetricsUpdated {
            session_id: self.session_id().to_string(),
            metrics,
            scores: self.scores,
        });
    }

    fn complete(&mut self) -> Result<()> {
        self.transition(OrchestratorState::Completed, "Request satisfied")?;
        info!(
            session_id = %self.session_id(),
            iterations = self.iteration,
            quality = self.scores.quality.overall,
            craziness = self.scores.craziness.overall,
            "Session completed"
        );
        self.publish(OrchestratorEvent::SessionCompleted {
            session_id: self.session_id().to_string(),
        });
        Ok(())
    }

    fn fail(&mut self, error: &OrchestratorError) -> Result<()> {
        let reason = error.to_string();
        self.transition(OrchestratorState::Failed, &reason)?;
        warn!(
            session_id = %self.session_id(),
            kind = %error.kind(),
            iterations = self.iteration,
            reason = %reason,
            "Session failed"
        );
        self.publish(OrchestratorEvent::SessionFailed {
            session_id: self.session_id().to_string(),
            reason: reason.clone(),
        });
        self.failure = Some((error.kind(), reason));
        Ok(())
    }

    fn transition(&mut self, target: OrchestratorState, reason: &str) -> Result<()> {
        if !self.state.can_transition_to(target) {
            error!(
                session_id = %self.session_id(),
                from = %self.state,
                to = %target,
                reason = %reason,
                allowed = ?self.state.allowed_transitions(),
                "Invalid state transition attempted"
            );
            return Err(OrchestratorError::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                allowed: format!("{:?}", self.state.allowed_transitions()),
            });
        }

        debug!(
            session_id = %self.session_id(),
            from = %self.state,
            to = %target,
            reason = %reason,
            "State transition"
        );
        let from = self.state;
        self.transitions
            .push(StateTransition::new(from, target, reason));
        self.state = target;
        self.publish(OrchestratorEvent::StateChanged {
            session_id: self.session_id().to_string(),
            from,
            to: target,
        });
        Ok(())
    }

    fn subscribe_cancel(&self, session_id: &str) -> Subscription {
        let cancel = self.cancel.clone();
        let session_id = session_id.to_string();
        let handler = FnHandler(move |event: &OrchestratorEvent| {
            if event.session_id() == session_id {
                info!(session_id = %session_id, "Cancellation requested");
                cancel.cancel();
            }
        });
        self.bus.subscribe("CancelRequested", Arc::new(handler))
    }

    fn publish(&self, event: OrchestratorEvent) {
        self.bus.publish(event);
    }

    fn session_id(&self) -> &str {
        self.session
            .as_ref()
            .map(|s| s.session_id())
            .unwrap_or_default()
    }

    fn outcome(&self) -> SessionOutcome {
        let usage = self.tracker.usage();
        let mut result = SessionResult::from_scores(&self.scores);
        result.duration_ms = self.metrics.elapsed().as_millis() as u64;
        result.tokens_used = usage.tokens;
        result.cost_usd = usage.cost_usd;
        result.iterations_completed = self.iteration;
        result.output = self.last_output.clone();

        match &self.failure {
            None => SessionOutcome::completed(self.session_id(), result),
            Some((kind, reason)) => SessionOutcome::failed(
                self.session_id(),
                SessionFailure {
                    kind: *kind,
                    reason: reason.clone(),
                    partial: result,
                },
            ),
        }
    }
}
