//! Testing utilities for the delivery workspace
//!
//! Shared fixtures, an in-memory tracker and a fault-injecting store.

#![allow(missing_docs)]

mod fake_tracker;
mod flaky_store;

pub use fake_tracker::FakeTracker;
pub use flaky_store::FlakyStore;

use delivery_model::{
    Artifact, ArtifactRepo, InMemoryStore, Principal, Project, ProjectRepo, ProjectStatus,
    RepositoryLink, Role, Ticket, TicketRepo, UserId,
};
use delivery_sync::{Issue, Owner, Repository};
use serde_json::json;

pub const REPO_ID: u64 = 90_210;
pub const REPO_OWNER: &str = "acme";
pub const REPO_NAME: &str = "client-portal";

pub fn principal(role: Role) -> Principal {
    Principal::new(UserId::new(), role)
}

pub fn repository_link() -> RepositoryLink {
    RepositoryLink::new(REPO_ID, REPO_OWNER, REPO_NAME)
}

pub fn github_repository() -> Repository {
    Repository {
        id: REPO_ID,
        name: REPO_NAME.to_string(),
        owner: Owner {
            login: REPO_OWNER.to_string(),
        },
    }
}

pub async fn project_in(store: &InMemoryStore, status: ProjectStatus) -> Project {
    let project = Project::new("Client portal").with_status(status);
    store.insert_project(project.clone()).await.unwrap();
    project
}

pub async fn connected_project(store: &InMemoryStore) -> Project {
    let project = Project::new("Client portal").with_repository(repository_link());
    store.insert_project(project.clone()).await.unwrap();
    project
}

pub async fn draft_artifact(store: &InMemoryStore, project: &Project) -> Artifact {
    let artifact = Artifact::new(
        project.id,
        "Statement of work",
        json!({ "sections": ["scope", "timeline", "budget"], "total": 48000 }),
    );
    store.insert_artifact(artifact.clone()).await.unwrap();
    artifact
}

pub async fn ticket_in(store: &InMemoryStore, project: &Project, title: &str) -> Ticket {
    let ticket = Ticket::new(project.id, title).with_description(format!("{title} details"));
    store.insert_ticket(ticket.clone()).await.unwrap();
    ticket
}

/// `count` open issues numbered from 1
pub fn numbered_issues(count: u64) -> Vec<Issue> {
    (1..=count)
        .map(|n| Issue::new(n, format!("Issue {n}")).with_body(format!("Body of issue {n}")))
        .collect()
}
