use serde::{Deserialize, Serialize};

use crate::budget::ResourceDelta;
use crate::decision::ProposedAction;

/// One selected piece of work for a single iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOfWork {
    pub id: String,
    /// Identifies the approach being tried. Repeated no-progress failures of
    /// one signature are treated as a loop.
    pub signature: String,
    pub description: String,
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ProposedAction>,
}

impl UnitOfWork {
    pub fn new(
        id: impl Into<String>,
        signature: impl Into<String>,
        description: impl Into<String>,
        iteration: u32,
    ) -> Self {
        Self {
            id: id.into(),
            signature: signature.into(),
            description: description.into(),
            iteration,
            action: None,
        }
    }

    pub fn with_action(mut self, action: ProposedAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn is_risky(&self) -> bool {
        self.action.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TddPhase {
    Red,
    Green,
    Refactor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub run: u32,
    pub passed: u32,
}

/// What the executor reports back for one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub resource_delta: ResourceDelta,
    /// The unit left the workspace in a state that must be rolled back.
    pub catastrophic: bool,
    /// Measurable progress was made, even if the unit failed.
    pub progress: bool,
    /// The original request is now fully satisfied.
    pub request_satisfied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tdd_phase: Option<TddPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ExecutionReport {
    pub fn success() -> Self {
        Self {
            success: true,
            progress: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn satisfied(mut self) -> Self {
        self.request_satisfied = true;
        self
    }

    pub fn with_delta(mut self, delta: ResourceDelta) -> Self {
        self.resource_delta = delta;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn catastrophic(mut self) -> Self {
        self.catastrophic = true;
        self
    }

    pub fn with_tests(mut self, run: u32, passed: u32) -> Self {
        self.tests = Some(TestCounts { run, passed });
        self
    }

    pub fn with_tdd_phase(mut self, phase: TddPhase) -> Self {
        self.tdd_phase = Some(phase);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Read-only view handed to the planner.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub session_id: &'a str,
    pub request: &'a str,
    pub iteration: u32,
    pub loops_broken: u32,
    /// Signatures that were abandoned after a loop break.
    pub abandoned_signatures: &'a [String],
    pub last_report: Option<&'a ExecutionReport>,
}

impl PlanContext<'_> {
    /// `unit-<iteration>` on signature `approach-<loops_broken>`, so a loop
    /// break naturally yields a new approach.
    pub fn default_unit(&self) -> UnitOfWork {
        UnitOfWork::new(
            format!("unit-{}", self.iteration),
            format!("approach-{}", self.loops_broken),
            self.request,
            self.iteration,
        )
    }
}
