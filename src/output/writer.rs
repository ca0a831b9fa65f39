use std::io::{self, Write};

use serde::Serialize;
use tracing::debug;

use crate::cli::{Display, OutputFormat};
use crate::notification::OrchestratorEvent;
use crate::orchestrator::SessionOutcome;

/// Renders session results on stdout.
///
/// Text goes through [`Display`]. `json` prints the outcome as one document,
/// `stream` additionally prints every event as it is published, one JSON
/// object per line.
pub struct OutputWriter {
    format: OutputFormat,
    display: Display,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            display: Display::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.format == OutputFormat::Text
    }

    pub fn emit_outcome(&self, outcome: &SessionOutcome) {
        if self.is_text() {
            self.display.print_outcome(outcome);
        } else {
            self.json_line(outcome);
        }
    }

    /// No-op unless streaming.
    pub fn emit_event(&self, event: &OrchestratorEvent) {
        if self.format == OutputFormat::Stream {
            self.json_line(event);
        }
    }

    /// Config documents are shown as TOML in text mode.
    pub fn emit_document<T: Serialize>(&self, value: &T) {
        if !self.is_text() {
            self.json_line(value);
            return;
        }
        match toml::to_string_pretty(value) {
            Ok(text) => print!("{}", text),
            Err(e) => self
                .display
                .print_error(&format!("Cannot render document as TOML: {}", e)),
        }
    }

    pub fn emit_message(&self, message: &str) {
        if self.is_text() {
            self.display.print_success(message);
        } else {
            self.json_line(&Notice { message });
        }
    }

    fn json_line<T: Serialize + ?Sized>(&self, value: &T) {
        let mut out = io::stdout().lock();
        let written = serde_json::to_writer(&mut out, value)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(out))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            debug!(error = %e, "Failed to write output line");
        }
    }
}

#[derive(Serialize)]
struct Notice<'a> {
    message: &'a str,
}
