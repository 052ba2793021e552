use async_trait::async_trait;
use delivery_model::RepositoryLink;
use delivery_sync::{
    Issue, IssueState, IssueTracker, IssueUpdate, Label, NewIssue, Repository, TrackerError,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct State {
    repositories: Vec<Repository>,
    issues: BTreeMap<u64, Issue>,
    next_number: u64,
    creates: usize,
    updates: usize,
    fail_updates: Option<TrackerError>,
}

/// In-memory tracker holding the issues of every repository in one map
#[derive(Debug, Default)]
pub struct FakeTracker {
    state: Mutex<State>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, repository: Repository) -> Self {
        self.state.lock().repositories.push(repository);
        self
    }

    pub fn with_issues(self, issues: impl IntoIterator<Item = Issue>) -> Self {
        {
            let mut state = self.state.lock();
            for issue in issues {
                state.next_number = state.next_number.max(issue.number);
                state.issues.insert(issue.number, issue);
            }
        }
        self
    }

    /// Every subsequent update fails with `error`
    pub fn fail_updates(&self, error: TrackerError) {
        self.state.lock().fail_updates = Some(error);
    }

    /// Drop an issue, as if it was deleted or transferred away
    pub fn remove_issue(&self, number: u64) -> Option<Issue> {
        self.state.lock().issues.remove(&number)
    }

    pub fn issue(&self, number: u64) -> Option<Issue> {
        self.state.lock().issues.get(&number).cloned()
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().issues.len()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().creates
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().updates
    }
}

fn labels(names: &[String]) -> Vec<Label> {
    names.iter().map(|name| Label { name: name.clone() }).collect()
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn repository(&self, owner: &str, name: &str) -> Result<Repository, TrackerError> {
        self.state
            .lock()
            .repositories
            .iter()
            .find(|r| r.owner.login == owner && r.name == name)
            .cloned()
            .ok_or_else(|| TrackerError::Http {
                status: 404,
                message: "Not Found".into(),
            })
    }

    async fn create_issue(
        &self,
        _repo: &RepositoryLink,
        issue: &NewIssue,
    ) -> Result<Issue, TrackerError> {
        let mut state = self.state.lock();
        state.creates += 1;
        state.next_number += 1;
        let created = Issue {
            number: state.next_number,
            title: issue.title.clone(),
            body: Some(issue.body.clone()),
            state: IssueState::Open,
            labels: labels(&issue.labels),
            pull_request: None,
        };
        state.issues.insert(created.number, created.clone());
        Ok(created)
    }

    async fn update_issue(
        &self,
        _repo: &RepositoryLink,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue, TrackerError> {
        let mut state = self.state.lock();
        state.updates += 1;
        if let Some(error) = state.fail_updates.clone() {
            return Err(error);
        }
        let issue = state.issues.get_mut(&number).ok_or_else(|| TrackerError::Http {
            status: 404,
            message: "Not Found".into(),
        })?;
        issue.title.clone_from(&update.title);
        issue.body = Some(update.body.clone());
        issue.state = update.state;
        issue.labels = labels(&update.labels);
        Ok(issue.clone())
    }

    async fn list_issues(&self, _repo: &RepositoryLink) -> Result<Vec<Issue>, TrackerError> {
        Ok(self.state.lock().issues.values().cloned().collect())
    }
}
