//! Quality and craziness scores derived from live session state.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::domain::AutonomyLevel;
use crate::metrics::SessionMetrics;
use crate::safety::SafetyStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScoreBreakdown {
    pub overall: f64,
    pub test_coverage: f64,
    pub code_quality: f64,
    pub decision_quality: f64,
    pub efficiency: f64,
    pub safety: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrazinessScoreBreakdown {
    pub overall: f64,
    pub level: AutonomyLevel,
    pub autonomy: f64,
    pub self_correction: f64,
    pub speed: f64,
    pub risk_taking: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub quality: QualityScoreBreakdown,
    pub craziness: CrazinessScoreBreakdown,
}

/// Computes both breakdowns. The only state kept between calls is the
/// smoothed speed.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    level: AutonomyLevel,
    previous_speed: Option<f64>,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig, level: AutonomyLevel) -> Self {
        Self {
            config,
            level,
            previous_speed: None,
        }
    }

    pub fn reset(&mut self) {
        self.previous_speed = None;
    }

    pub fn compute(&mut self, status: &SafetyStatus, metrics: &SessionMetrics) -> Scores {
        Scores {
            quality: self.quality(status, metrics),
            craziness: self.craziness(status, metrics),
        }
    }

    fn quality(&self, status: &SafetyStatus, metrics: &SessionMetrics) -> QualityScoreBreakdown {
        let tasks = metrics.tasks;
        let completed_ratio = tasks.completed as f64 / tasks.total.max(1) as f64;
        let rollbacks = status.rollbacks.count as f64;
        let loops = status.loops.loops_broken as f64;

        let test_coverage = if metrics.tests.run == 0 {
            0.0
        } else {
            metrics.tests.pass_rate * 100.0
        };
        let code_quality = 100.0 * completed_ratio - self.config.rollback_penalty * rollbacks;
        let decision_quality =
            100.0 * metrics.decisions.approved as f64 / metrics.decisions.total.max(1) as f64;
        let consumed = 1.0 - status.resources.surplus_ratio;
        let efficiency = if tasks.completed == 0 && tasks.total > 0 {
            0.0
        } else {
            100.0 * (1.0 - consumed / tasks.completed.max(1) as f64)
        };
        let safety = if status.safe { 100.0 } else { 0.0 }
            - self.config.loop_penalty * loops
            - self.config.rollback_penalty * rollbacks;

        let mut breakdown = QualityScoreBreakdown {
            overall: 0.0,
            test_coverage: clamp_score(test_coverage),
            code_quality: clamp_score(code_quality),
            decision_quality: clamp_score(decision_quality),
            efficiency: clamp_score(efficiency),
            safety: clamp_score(safety),
        };

        let w = &self.config.weights;
        let weighted = [
            (breakdown.test_coverage, w.test_coverage),
            (breakdown.code_quality, w.code_quality),
            (breakdown.decision_quality, w.decision_quality),
            (breakdown.efficiency, w.efficiency),
            (breakdown.safety, w.safety),
        ];
        let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
        let overall = if total_weight > 0.0 {
            weighted.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight
        } else {
            0.0
        };
        breakdown.overall = round1(clamp_score(overall));
        breakdown
    }

    fn craziness(
        &mut self,
        status: &SafetyStatus,
        metrics: &SessionMetrics,
    ) -> CrazinessScoreBreakdown {
        let autonomy = self.level.craziness_score() as f64;

        let loops = status.loops.loops_broken;
        let self_correction = if loops == 0 {
            0.0
        } else {
            100.0 * status.loops.recovered as f64 / loops as f64
        };

        let speed = self.smoothed_speed(metrics);

        let risk_taking =
            100.0 * metrics.decisions.auto_approved as f64 / metrics.decisions.total.max(1) as f64;

        let parts = [
            clamp_score(autonomy),
            clamp_score(self_correction),
            clamp_score(speed),
            clamp_score(risk_taking),
        ];
        CrazinessScoreBreakdown {
            overall: round1(clamp_score(parts.iter().sum::<f64>() / parts.len() as f64)),
            level: self.level,
            autonomy: parts[0],
            self_correction: parts[1],
            speed: parts[2],
            risk_taking: parts[3],
        }
    }

    fn smoothed_speed(&mut self, metrics: &SessionMetrics) -> f64 {
        let sample = if metrics.iterations == 0 {
            0.0
        } else {
            let minutes = metrics.duration.max(1) as f64 / 60_000.0;
            let ipm = metrics.iterations as f64 / minutes;
            clamp_score(100.0 * ipm / self.config.speed_baseline_ipm)
        };

        let alpha = self.config.speed_smoothing;
        let speed = match self.previous_speed {
            Some(previous) => alpha * sample + (1.0 - alpha) * previous,
            None => sample,
        };
        let speed = clamp_score(speed);
        self.previous_speed = Some(speed);
        speed
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else if value == f64::INFINITY {
        100.0
    } else {
        0.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
