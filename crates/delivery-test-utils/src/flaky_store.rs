use async_trait::async_trait;
use delivery_model::{
    Artifact, ArtifactId, ArtifactRepo, AuditEntry, AuditRepo, EntityType, InMemoryStore,
    Notification, Project, ProjectId, ProjectRepo, Signoff, SignoffId, SignoffRepo, StoreError,
    StoreResult, SyncRecord, SyncRecordRepo, Ticket, TicketId, TicketRepo,
};
use std::collections::HashSet;

/// [`InMemoryStore`] whose ticket inserts fail for chosen titles and whose
/// SyncRecord inserts can be made to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failing_titles: HashSet<String>,
    failing_record_inserts: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_ticket_title(mut self, title: impl Into<String>) -> Self {
        self.failing_titles.insert(title.into());
        self
    }

    pub fn failing_sync_record_inserts(mut self) -> Self {
        self.failing_record_inserts = true;
        self
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl ProjectRepo for FlakyStore {
    async fn project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        self.inner.project(id).await
    }

    async fn insert_project(&self, project: Project) -> StoreResult<()> {
        self.inner.insert_project(project).await
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        self.inner.update_project(project).await
    }

    async fn project_by_repository(&self, repository_id: u64) -> StoreResult<Option<Project>> {
        self.inner.project_by_repository(repository_id).await
    }
}

#[async_trait]
impl ArtifactRepo for FlakyStore {
    async fn artifact(&self, id: ArtifactId) -> StoreResult<Option<Artifact>> {
        self.inner.artifact(id).await
    }

    async fn insert_artifact(&self, artifact: Artifact) -> StoreResult<()> {
        self.inner.insert_artifact(artifact).await
    }

    async fn update_artifact(&self, artifact: &Artifact) -> StoreResult<()> {
        self.inner.update_artifact(artifact).await
    }
}

#[async_trait]
impl SignoffRepo for FlakyStore {
    async fn signoff(&self, id: SignoffId) -> StoreResult<Option<Signoff>> {
        self.inner.signoff(id).await
    }

    async fn insert_signoff(&self, signoff: Signoff) -> StoreResult<()> {
        self.inner.insert_signoff(signoff).await
    }

    async fn update_signoff(&self, signoff: &Signoff) -> StoreResult<()> {
        self.inner.update_signoff(signoff).await
    }

    async fn signoffs_for_artifact(&self, artifact_id: ArtifactId) -> StoreResult<Vec<Signoff>> {
        self.inner.signoffs_for_artifact(artifact_id).await
    }
}

#[async_trait]
impl TicketRepo for FlakyStore {
    async fn ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        self.inner.ticket(id).await
    }

    async fn insert_ticket(&self, ticket: Ticket) -> StoreResult<()> {
        if self.failing_titles.contains(&ticket.title) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for ticket {:?}",
                ticket.title
            )));
        }
        self.inner.insert_ticket(ticket).await
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        self.inner.update_ticket(ticket).await
    }
}

#[async_trait]
impl SyncRecordRepo for FlakyStore {
    async fn sync_record_by_external(
        &self,
        repository_id: u64,
        entity_type: EntityType,
        external_id: u64,
    ) -> StoreResult<Option<SyncRecord>> {
        self.inner
            .sync_record_by_external(repository_id, entity_type, external_id)
            .await
    }

    async fn sync_record_by_ticket(
        &self,
        ticket_id: TicketId,
        entity_type: EntityType,
    ) -> StoreResult<Option<SyncRecord>> {
        self.inner.sync_record_by_ticket(ticket_id, entity_type).await
    }

    async fn sync_records_for_project(
        &self,
        project_id: ProjectId,
    ) -> StoreResult<Vec<SyncRecord>> {
        self.inner.sync_records_for_project(project_id).await
    }

    async fn insert_sync_record(&self, record: SyncRecord) -> StoreResult<()> {
        if self.failing_record_inserts {
            return Err(StoreError::Unavailable(
                "injected failure for sync record".into(),
            ));
        }
        self.inner.insert_sync_record(record).await
    }

    async fn update_sync_record(&self, record: &SyncRecord) -> StoreResult<()> {
        self.inner.update_sync_record(record).await
    }
}

#[async_trait]
impl AuditRepo for FlakyStore {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.inner.append_audit(entry).await
    }

    async fn push_notification(&self, notification: Notification) -> StoreResult<()> {
        self.inner.push_notification(notification).await
    }
}
