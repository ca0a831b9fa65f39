use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::bus::EventHandler;
use super::events::OrchestratorEvent;
use crate::error::Result;

/// Appends every event as one JSON line to `<logs_dir>/<session_id>.jsonl`.
#[derive(Debug, Clone)]
pub struct EventLog {
    logs_dir: PathBuf,
}

impl EventLog {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.jsonl", session_id))
    }

    fn render(event: &OrchestratorEvent) -> Result<String> {
        let mut value = serde_json::to_value(event)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "at".into(),
                json!(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            );
        }
        let mut line = serde_json::to_string(&value)?;
        line.push('\n');
        Ok(line)
    }
}

#[async_trait]
impl EventHandler for EventLog {
    async fn handle(&self, event: &OrchestratorEvent) -> Result<()> {
        let line = Self::render(event)?;
        tokio::fs::create_dir_all(&self.logs_dir).await?;

        let path = self.path_for(event.session_id());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        debug!(event = event.name(), path = %path.display(), "Event logged");
        Ok(())
    }
}
