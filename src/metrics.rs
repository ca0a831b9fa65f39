//! Session counters feeding the scoring engine.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::executor::{ExecutionReport, TddPhase};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStats {
    pub run: u32,
    pub passed: u32,
    /// `passed / run`, 0 when nothing ran.
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionCounts {
    pub total: u32,
    pub approved: u32,
    /// Approved without asking a human.
    pub auto_approved: u32,
    /// Sent to a human, whether answered or timed out.
    pub escalated: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TddCounts {
    pub cycles: u32,
    pub red_passed: u32,
    pub green_passed: u32,
    pub refactor_passed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub tasks: TaskCounts,
    pub tests: TestStats,
    pub decisions: DecisionCounts,
    pub tdd: TddCounts,
    pub iterations: u32,
    /// Elapsed session time in milliseconds.
    pub duration: u64,
}

/// Accumulates session counters. Counters only grow until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: SessionMetrics,
    started: Option<Instant>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all counters and starts the session clock.
    pub fn reset(&mut self) {
        self.metrics = SessionMetrics::default();
        self.started = Some(Instant::now());
    }

    pub fn record_iteration(&mut self) {
        self.metrics.iterations += 1;
    }

    pub fn record_task(&mut self, report: &ExecutionReport) {
        let tasks = &mut self.metrics.tasks;
        tasks.total += 1;
        if report.success {
            tasks.completed += 1;
        } else {
            tasks.failed += 1;
        }

        if let Some(counts) = report.tests {
            let tests = &mut self.metrics.tests;
            tests.run += counts.run;
            tests.passed += counts.passed.min(counts.run);
            tests.pass_rate = if tests.run == 0 {
                0.0
            } else {
                tests.passed as f64 / tests.run as f64
            };
        }

        if report.success
            && let Some(phase) = report.tdd_phase
        {
            let tdd = &mut self.metrics.tdd;
            match phase {
                TddPhase::Red => tdd.red_passed += 1,
                TddPhase::Green => tdd.green_passed += 1,
                TddPhase::Refactor => {
                    tdd.refactor_passed += 1;
                    tdd.cycles += 1;
                }
            }
        }
    }

    pub fn record_decision(&mut self, decision: &Decision) {
        let decisions = &mut self.metrics.decisions;
        decisions.total += 1;
        if decision.approved {
            decisions.approved += 1;
            if decision.kind.is_automatic() {
                decisions.auto_approved += 1;
            }
        }
        if !decision.kind.is_automatic() {
            decisions.escalated += 1;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> SessionMetrics {
        SessionMetrics {
            duration: self.elapsed().as_millis() as u64,
            ..self.metrics
        }
    }
}
