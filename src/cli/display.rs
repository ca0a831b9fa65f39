use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::OrchestratorState;
use crate::orchestrator::{SessionOutcome, SessionResult};
use crate::scoring::{CrazinessScoreBreakdown, QualityScoreBreakdown};

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_outcome(&self, outcome: &SessionOutcome) {
        self.print_header(&format!("Session: {}", outcome.session_id));

        println!(
            "Status:      {}",
            self.state_style(outcome.state)
                .apply_to(outcome.state.to_string())
        );
        if let Some(failure) = &outcome.error {
            println!("Failure:     {} ({})", failure.reason, style(failure.kind).dim());
        }

        let Some(result) = outcome.scores() else {
            return;
        };
        self.print_usage(result);
        println!();
        self.print_quality(&result.quality);
        println!();
        self.print_craziness(&result.craziness);

        if let Some(output) = &result.output {
            println!();
            println!("{}", style("Last output:").bold());
            for line in output.lines() {
                println!("  {}", style(line).dim());
            }
        }
        println!();
    }

    fn print_usage(&self, result: &SessionResult) {
        println!("Iterations:  {}", result.iterations_completed);
        println!("Tokens:      {}", result.tokens_used);
        println!("Cost:        ${:.2}", result.cost_usd);
        println!(
            "Duration:    {:.1}s",
            result.duration_ms as f64 / 1000.0
        );
    }

    fn print_quality(&self, quality: &QualityScoreBreakdown) {
        println!(
            "{} {}",
            style("Quality").bold(),
            self.score_line(quality.overall)
        );
        for (label, value) in [
            ("tests", quality.test_coverage),
            ("code", quality.code_quality),
            ("decisions", quality.decision_quality),
            ("efficiency", quality.efficiency),
            ("safety", quality.safety),
        ] {
            println!("  {:<15} {}", label, self.score_line(value));
        }
    }

    fn print_craziness(&self, craziness: &CrazinessScoreBreakdown) {
        println!(
            "{} {} {}",
            style("Craziness").bold(),
            self.score_line(craziness.overall),
            style(format!("[{}]", craziness.level)).magenta()
        );
        for (label, value) in [
            ("autonomy", craziness.autonomy),
            ("self-correction", craziness.self_correction),
            ("speed", craziness.speed),
            ("risk-taking", craziness.risk_taking),
        ] {
            println!("  {:<15} {}", label, self.score_line(value));
        }
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        pb
    }

    pub fn state_style(&self, state: OrchestratorState) -> Style {
        match state {
            OrchestratorState::Idle => Style::new().dim(),
            OrchestratorState::Planning => Style::new().blue(),
            OrchestratorState::Executing => Style::new().yellow().bold(),
            OrchestratorState::Verifying => Style::new().cyan(),
            OrchestratorState::AwaitingApproval => Style::new().yellow().bold().underlined(),
            OrchestratorState::Completed => Style::new().green(),
            OrchestratorState::Failed => Style::new().red().bold(),
        }
    }

    fn score_line(&self, score: f64) -> String {
        format!("{} {:>5.1}", self.score_bar(score, 20), score)
    }

    fn score_bar(&self, score: f64, width: usize) -> String {
        let filled = ((width as f64 * score.clamp(0.0, 100.0) / 100.0).round() as usize).min(width);
        let empty = width - filled;

        format!(
            "{}{}",
            style("█".repeat(filled)).green(),
            style("░".repeat(empty)).dim()
        )
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
