//! Console prompt for human-in-the-loop approvals.

use std::io;

use async_trait::async_trait;
use console::{Term, style};
use indicatif::ProgressBar;

use crate::decision::{ApprovalRequest, HumanChannel, HumanVerdict};
use crate::error::{OrchestratorError, Result};

/// Asks the person at the terminal to approve or reject a risky action.
///
/// The prompt runs on a blocking thread. The orchestrator's approval timeout
/// still applies; a late answer is discarded.
#[derive(Clone, Default)]
pub struct ConsoleHumanChannel {
    spinner: Option<ProgressBar>,
}

impl ConsoleHumanChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hides `spinner` while the prompt is on screen.
    pub fn with_spinner(mut self, spinner: ProgressBar) -> Self {
        self.spinner = Some(spinner);
        self
    }

    fn prompt(request: &ApprovalRequest) -> Result<HumanVerdict> {
        let term = Term::stderr();
        let action = &request.action;

        term.write_line("")?;
        term.write_line(
            &style("┌─ Approval required ─────────────────────────────────────")
                .yellow()
                .bold()
                .to_string(),
        )?;
        term.write_line(&format!("│ Session:  {}", request.session_id))?;
        term.write_line(&format!("│ Unit:     {}", request.unit_id))?;
        term.write_line(&format!(
            "│ Action:   {} ({} risk)",
            style(action.label()).bold(),
            action.risk_tier()
        ))?;
        if !action.description.is_empty() {
            term.write_line(&format!("│ Details:  {}", action.description))?;
        }
        if let Some(amount) = action.amount {
            term.write_line(&format!("│ Amount:   ${:.2}", amount))?;
        }
        term.write_line(&format!(
            "│ Level:    {} ({}), timeout {}s",
            request.autonomy_level,
            request.autonomy_level.description(),
            request.timeout_ms / 1000
        ))?;
        term.write_line(
            &style("└─────────────────────────────────────────────────────────")
                .yellow()
                .to_string(),
        )?;

        loop {
            term.write_str(&style("Approve? [y/n]: ").cyan().to_string())?;
            let mut input = String::new();
            if io::stdin().read_line(&mut input)? == 0 {
                return Err(OrchestratorError::HumanChannel("stdin closed".into()));
            }
            match input.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(HumanVerdict::Approve),
                "n" | "no" => return Ok(HumanVerdict::Reject),
                _ => term.write_line(&style("Please answer y or n").red().to_string())?,
            }
        }
    }
}

#[async_trait]
impl HumanChannel for ConsoleHumanChannel {
    async fn ask(&self, request: &ApprovalRequest) -> Result<HumanVerdict> {
        let request = request.clone();
        let spinner = self.spinner.clone();

        tokio::task::spawn_blocking(move || match spinner {
            Some(spinner) => spinner.suspend(|| Self::prompt(&request)),
            None => Self::prompt(&request),
        })
        .await
        .map_err(|e| OrchestratorError::HumanChannel(format!("prompt task failed: {}", e)))?
    }
}
