use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Immutable identity of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    session_id: String,
    request_id: String,
    request: String,
    start_time: DateTime<Utc>,
}

impl SessionContext {
    /// Builds a context for `request`, generating a session id when none is given.
    pub fn new(request: &str, session_id: Option<String>) -> Result<Self> {
        let request = request.trim();
        if request.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "request must not be empty".into(),
            ));
        }

        Ok(Self {
            session_id: session_id.unwrap_or_else(new_session_id),
            request_id: uuid::Uuid::new_v4().to_string(),
            request: request.to_string(),
            start_time: Utc::now(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }
}

/// `ses-` followed by 12 hex characters.
pub fn new_session_id() -> String {
    format!("ses-{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_request() {
        assert!(matches!(
            SessionContext::new("   \n\t", None),
            Err(OrchestratorError::InvalidRequest(_))
        ));
        assert!(SessionContext::new("", None).is_err());
    }

    #[test]
    fn test_generates_ids() {
        let a = SessionContext::new("refactor parser", None).unwrap();
        let b = SessionContext::new("refactor parser", None).unwrap();
        assert!(a.session_id().starts_with("ses-"));
        assert_ne!(a.session_id(), b.session_id());
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.request(), "refactor parser");
    }

    #[test]
    fn test_pinned_session_id() {
        let ctx = SessionContext::new(" fix bug ", Some("ses-fixed".into())).unwrap();
        assert_eq!(ctx.session_id(), "ses-fixed");
        assert_eq!(ctx.request(), "fix bug");
    }
}
