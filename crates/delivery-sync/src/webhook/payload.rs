//! Webhook event kinds and the `issues` payload

use crate::error::WebhookError;
use crate::tracker::{Issue, Repository};
use serde::{Deserialize, Serialize};

/// Event named by the `X-GitHub-Event` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Issues,
    PullRequest,
    Ping,
    Other(String),
}

impl EventKind {
    /// Parse header value
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        match value.trim() {
            "issues" => Self::Issues,
            "pull_request" => Self::PullRequest,
            "ping" => Self::Ping,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Body of an `issues` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: Issue,
    pub repository: Repository,
}

impl IssuesEvent {
    /// Decode from the raw body
    ///
    /// # Errors
    /// [`WebhookError::InvalidPayload`] if the body is not an `issues` payload
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Whether the issue no longer exists in this repository
    #[inline]
    #[must_use]
    pub fn is_removal(&self) -> bool {
        matches!(self.action.as_str(), "deleted" | "transferred")
    }
}
