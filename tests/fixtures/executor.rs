//! Scripted task executor: replays a fixed list of reports.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use autonomy_engine::decision::ProposedAction;
use autonomy_engine::error::{OrchestratorError, Result};
use autonomy_engine::executor::{ExecutionReport, PlanContext, TaskExecutor, UnitOfWork};

/// One scripted response to `execute`.
#[derive(Debug, Clone)]
pub enum Step {
    Report(ExecutionReport),
    Error(String),
}

impl From<ExecutionReport> for Step {
    fn from(report: ExecutionReport) -> Self {
        Self::Report(report)
    }
}

/// Returns the scripted steps in order and repeats the last one forever.
pub struct ScriptedExecutor {
    steps: Vec<Step>,
    action: Option<(ProposedAction, Option<HashSet<u32>>)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    executed: Mutex<Vec<UnitOfWork>>,
}

impl ScriptedExecutor {
    pub fn new(steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty(), "script needs at least one step");
        Self {
            steps,
            action: None,
            delay: None,
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(reports: Vec<ExecutionReport>) -> Self {
        Self::new(reports.into_iter().map(Step::from).collect())
    }

    pub fn repeating(report: ExecutionReport) -> Self {
        Self::reports(vec![report])
    }

    /// Attaches `action` to every planned unit.
    pub fn with_action(mut self, action: ProposedAction) -> Self {
        self.action = Some((action, None));
        self
    }

    /// Attaches `action` only to units planned for the given iterations.
    pub fn with_action_at(mut self, iterations: &[u32], action: ProposedAction) -> Self {
        self.action = Some((action, Some(iterations.iter().copied().collect())));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<UnitOfWork> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn plan(&self, ctx: &PlanContext<'_>) -> Result<UnitOfWork> {
        let unit = ctx.default_unit();
        Ok(match &self.action {
            Some((action, None)) => unit.with_action(action.clone()),
            Some((action, Some(at))) if at.contains(&ctx.iteration) => {
                unit.with_action(action.clone())
            }
            _ => unit,
        })
    }

    async fn execute(&self, unit: &UnitOfWork) -> Result<ExecutionReport> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().push(unit.clone());

        let step = self
            .steps
            .get(call)
            .or_else(|| self.steps.last())
            .cloned()
            .expect("non-empty script");
        match step {
            Step::Report(report) => Ok(report),
            Step::Error(message) => Err(OrchestratorError::Executor(message)),
        }
    }
}
