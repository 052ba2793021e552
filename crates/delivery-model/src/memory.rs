//! In-process [`Store`](crate::store::Store) implementation
//!
//! Backs tests and single-node deployments. Row writes are atomic per key;
//! SyncRecord inserts and updates run under one lock so the uniqueness checks
//! and the write cannot interleave.

use crate::error::StoreError;
use crate::ids::{ArtifactId, ProjectId, SignoffId, SyncRecordId, TicketId};
use crate::records::{
    Artifact, AuditEntry, Notification, Project, Signoff, SyncRecord, Ticket,
};
use crate::status::EntityType;
use crate::store::{
    ArtifactRepo, AuditRepo, ProjectRepo, SignoffRepo, StoreResult, SyncRecordRepo, TicketRepo,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;

const EXTERNAL_KEY: &str = "sync_records_repository_entity_external_key";
const TICKET_KEY: &str = "sync_records_active_ticket_entity_key";

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    projects: DashMap<ProjectId, Project>,
    artifacts: DashMap<ArtifactId, Artifact>,
    signoffs: DashMap<SignoffId, Signoff>,
    tickets: DashMap<TicketId, Ticket>,
    sync_records: Mutex<HashMap<SyncRecordId, SyncRecord>>,
    audit: Mutex<Vec<AuditEntry>>,
    notifications: Mutex<Vec<Notification>>,
}

impl InMemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every ticket
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.iter().map(|t| t.value().clone()).collect()
    }

    /// Snapshot of every sync record
    #[must_use]
    pub fn sync_records(&self) -> Vec<SyncRecord> {
        self.sync_records.lock().values().cloned().collect()
    }

    /// Snapshot of the audit trail, oldest first
    #[must_use]
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }

    /// Snapshot of queued notifications, oldest first
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

fn replace<K, V>(table: &DashMap<K, V>, key: K, value: &V, entity: &'static str) -> StoreResult<()>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
    V: Clone,
{
    match table.get_mut(&key) {
        Some(mut row) => {
            *row = value.clone();
            Ok(())
        }
        None => Err(StoreError::MissingRow {
            entity,
            id: key.to_string(),
        }),
    }
}

fn check_unique(
    records: &HashMap<SyncRecordId, SyncRecord>,
    candidate: &SyncRecord,
) -> StoreResult<()> {
    for existing in records.values().filter(|r| r.id != candidate.id) {
        if existing.external_key() == candidate.external_key() {
            return Err(StoreError::UniqueViolation {
                constraint: EXTERNAL_KEY,
                key: format!(
                    "{}/{}/{}",
                    candidate.repository_id, candidate.entity_type, candidate.external_id
                ),
            });
        }
        if let Some(ticket_id) = candidate.ticket_id {
            if candidate.is_active()
                && existing.is_active()
                && existing.ticket_id == Some(ticket_id)
                && existing.entity_type == candidate.entity_type
            {
                return Err(StoreError::UniqueViolation {
                    constraint: TICKET_KEY,
                    key: format!("{ticket_id}/{}", candidate.entity_type),
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl ProjectRepo for InMemoryStore {
    async fn project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.projects.get(&id).map(|p| p.value().clone()))
    }

    async fn insert_project(&self, project: Project) -> StoreResult<()> {
        self.projects.insert(project.id, project);
        Ok(())
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        replace(&self.projects, project.id, project, "project")
    }

    async fn project_by_repository(&self, repository_id: u64) -> StoreResult<Option<Project>> {
        Ok(self
            .projects
            .iter()
            .find(|p| p.repository.as_ref().is_some_and(|r| r.id == repository_id))
            .map(|p| p.value().clone()))
    }
}

#[async_trait]
impl ArtifactRepo for InMemoryStore {
    async fn artifact(&self, id: ArtifactId) -> StoreResult<Option<Artifact>> {
        Ok(self.artifacts.get(&id).map(|a| a.value().clone()))
    }

    async fn insert_artifact(&self, artifact: Artifact) -> StoreResult<()> {
        self.artifacts.insert(artifact.id, artifact);
        Ok(())
    }

    async fn update_artifact(&self, artifact: &Artifact) -> StoreResult<()> {
        replace(&self.artifacts, artifact.id, artifact, "artifact")
    }
}

#[async_trait]
impl SignoffRepo for InMemoryStore {
    async fn signoff(&self, id: SignoffId) -> StoreResult<Option<Signoff>> {
        Ok(self.signoffs.get(&id).map(|s| s.value().clone()))
    }

    async fn insert_signoff(&self, signoff: Signoff) -> StoreResult<()> {
        self.signoffs.insert(signoff.id, signoff);
        Ok(())
    }

    async fn update_signoff(&self, signoff: &Signoff) -> StoreResult<()> {
        replace(&self.signoffs, signoff.id, signoff, "signoff")
    }

    async fn signoffs_for_artifact(&self, artifact_id: ArtifactId) -> StoreResult<Vec<Signoff>> {
        let mut rows: Vec<Signoff> = self
            .signoffs
            .iter()
            .filter(|s| s.artifact_id == artifact_id)
            .map(|s| s.value().clone())
            .collect();
        rows.sort_by_key(|s| s.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl TicketRepo for InMemoryStore {
    async fn ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        Ok(self.tickets.get(&id).map(|t| t.value().clone()))
    }

    async fn insert_ticket(&self, ticket: Ticket) -> StoreResult<()> {
        self.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        replace(&self.tickets, ticket.id, ticket, "ticket")
    }
}

#[async_trait]
impl SyncRecordRepo for InMemoryStore {
    async fn sync_record_by_external(
        &self,
        repository_id: u64,
        entity_type: EntityType,
        external_id: u64,
    ) -> StoreResult<Option<SyncRecord>> {
        let key = (repository_id, entity_type, external_id);
        Ok(self
            .sync_records
            .lock()
            .values()
            .find(|r| r.external_key() == key)
            .cloned())
    }

    async fn sync_record_by_ticket(
        &self,
        ticket_id: TicketId,
        entity_type: EntityType,
    ) -> StoreResult<Option<SyncRecord>> {
        Ok(self
            .sync_records
            .lock()
            .values()
            .find(|r| {
                r.is_active() && r.ticket_id == Some(ticket_id) && r.entity_type == entity_type
            })
            .cloned())
    }

    async fn sync_records_for_project(
        &self,
        project_id: ProjectId,
    ) -> StoreResult<Vec<SyncRecord>> {
        Ok(self
            .sync_records
            .lock()
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn insert_sync_record(&self, record: SyncRecord) -> StoreResult<()> {
        let mut records = self.sync_records.lock();
        check_unique(&records, &record)?;
        records.insert(record.id, record);
        Ok(())
    }

    async fn update_sync_record(&self, record: &SyncRecord) -> StoreResult<()> {
        let mut records = self.sync_records.lock();
        if !records.contains_key(&record.id) {
            return Err(StoreError::MissingRow {
                entity: "sync_record",
                id: record.id.to_string(),
            });
        }
        check_unique(&records, record)?;
        records.insert(record.id, record.clone());
        Ok(())
    }
}

#[async_trait]
impl AuditRepo for InMemoryStore {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.audit.lock().push(entry);
        Ok(())
    }

    async fn push_notification(&self, notification: Notification) -> StoreResult<()> {
        self.notifications.lock().push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RepositoryLink;
    use crate::status::{SyncDirection, SyncStatus};

    #[tokio::test]
    async fn update_missing_row_fails() {
        let store = InMemoryStore::new();
        let ticket = Ticket::new(ProjectId::new(), "ghost");
        let err = store.update_ticket(&ticket).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRow { entity: "ticket", .. }));
    }

    #[tokio::test]
    async fn external_key_is_unique() {
        let store = InMemoryStore::new();
        let project = ProjectId::new();
        store
            .insert_sync_record(SyncRecord::issue(project, 1, 5, None, SyncDirection::Inbound))
            .await
            .unwrap();

        let err = store
            .insert_sync_record(SyncRecord::issue(project, 1, 5, None, SyncDirection::Inbound))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        // Same number in another repository is a different issue.
        store
            .insert_sync_record(SyncRecord::issue(project, 2, 5, None, SyncDirection::Inbound))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn active_ticket_key_is_unique() {
        let store = InMemoryStore::new();
        let project = ProjectId::new();
        let ticket = TicketId::new();

        let mut first = SyncRecord::issue(project, 1, 1, Some(ticket), SyncDirection::Outbound);
        store.insert_sync_record(first.clone()).await.unwrap();

        let second = SyncRecord::issue(project, 1, 2, Some(ticket), SyncDirection::Outbound);
        assert!(store
            .insert_sync_record(second.clone())
            .await
            .unwrap_err()
            .is_unique_violation());

        // Once the first mapping is disconnected the ticket can be mapped again.
        first.sync_status = SyncStatus::Disconnected;
        store.update_sync_record(&first).await.unwrap();
        store.insert_sync_record(second).await.unwrap();

        let active = store
            .sync_record_by_ticket(ticket, EntityType::Issue)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.external_id, 2);
    }

    #[tokio::test]
    async fn project_lookup_by_repository() {
        let store = InMemoryStore::new();
        let project =
            Project::new("portal").with_repository(RepositoryLink::new(42, "acme", "portal"));
        let id = project.id;
        store.insert_project(project).await.unwrap();

        assert_eq!(
            store.project_by_repository(42).await.unwrap().unwrap().id,
            id
        );
        assert!(store.project_by_repository(43).await.unwrap().is_none());
    }
}
