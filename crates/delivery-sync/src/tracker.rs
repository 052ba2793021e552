//! External issue tracker seam
//!
//! Field names follow the GitHub REST representation so the HTTP client can
//! decode responses directly.

use crate::error::TrackerError;
use async_trait::async_trait;
use delivery_model::RepositoryLink;
use serde::{Deserialize, Serialize};

/// Open/closed state of a tracker issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// Issue label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Tracker issue as returned by the API
///
/// The issues listing also returns pull requests; those carry a
/// `pull_request` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: IssueState,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// Create open issue without labels or body
    #[must_use]
    pub fn new(number: u64, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            body: None,
            state: IssueState::Open,
            labels: Vec::new(),
            pull_request: None,
        }
    }

    /// With body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// With state
    #[must_use]
    pub fn with_state(mut self, state: IssueState) -> Self {
        self.state = state;
        self
    }

    /// With labels
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(|name| Label { name: name.into() }).collect();
        self
    }

    /// Mark as a pull request
    #[must_use]
    pub fn as_pull_request(mut self) -> Self {
        self.pull_request = Some(serde_json::json!({}));
        self
    }

    /// Whether this entry is a pull request rather than an issue
    #[inline]
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Label names
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

/// Repository owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Tracker repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub owner: Owner,
}

impl Repository {
    /// Link stored on the project
    #[must_use]
    pub fn to_link(&self) -> RepositoryLink {
        RepositoryLink::new(self.id, self.owner.login.clone(), self.name.clone())
    }
}

/// Payload for issue creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Full replacement of the synced issue fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub labels: Vec<String>,
}

/// Operations the sync engine needs from a tracker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Resolve a repository by owner and name
    async fn repository(&self, owner: &str, name: &str) -> Result<Repository, TrackerError>;

    /// Create an issue
    async fn create_issue(
        &self,
        repo: &RepositoryLink,
        issue: &NewIssue,
    ) -> Result<Issue, TrackerError>;

    /// Replace title, body, state and labels of an issue
    async fn update_issue(
        &self,
        repo: &RepositoryLink,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue, TrackerError>;

    /// Every issue and pull request in the repository, all states
    async fn list_issues(&self, repo: &RepositoryLink) -> Result<Vec<Issue>, TrackerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_github_issue() {
        let json = r#"{
            "number": 12,
            "title": "Login fails",
            "body": null,
            "state": "closed",
            "labels": [{"id": 1, "name": "status:done", "color": "ffffff"}],
            "user": {"login": "octocat"}
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.number, 12);
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(issue.label_names(), vec!["status:done".to_string()]);
        assert!(!issue.is_pull_request());
    }

    #[test]
    fn detects_pull_requests() {
        let json = r#"{"number": 3, "title": "PR", "state": "open",
            "pull_request": {"url": "https://example.invalid/pulls/3"}}"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(issue.is_pull_request());
    }
}
