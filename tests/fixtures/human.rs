//! Human channels with fixed behavior.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use autonomy_engine::decision::{ApprovalRequest, HumanChannel, HumanVerdict};
use autonomy_engine::error::Result;

pub struct ScriptedChannel {
    verdict: Option<HumanVerdict>,
    asked: AtomicUsize,
}

impl ScriptedChannel {
    pub fn approve() -> Self {
        Self::with(Some(HumanVerdict::Approve))
    }

    pub fn reject() -> Self {
        Self::with(Some(HumanVerdict::Reject))
    }

    /// Never answers.
    pub fn silent() -> Self {
        Self::with(None)
    }

    fn with(verdict: Option<HumanVerdict>) -> Self {
        Self {
            verdict,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HumanChannel for ScriptedChannel {
    async fn ask(&self, _request: &ApprovalRequest) -> Result<HumanVerdict> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Some(verdict) => Ok(verdict),
            None => std::future::pending().await,
        }
    }
}
