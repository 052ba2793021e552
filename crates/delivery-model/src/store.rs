//! Persistence seam
//!
//! The engines only need single-row reads and writes with read-after-write
//! consistency, plus the two SyncRecord uniqueness guarantees:
//!
//! - at most one record per `(repository_id, entity_type, external_id)`
//! - at most one *active* record per `(ticket_id, entity_type)`
//!
//! Implementations must reject violating inserts with
//! [`StoreError::UniqueViolation`]; callers rely on that instead of locking.

use crate::error::StoreError;
use crate::ids::{ArtifactId, ProjectId, SignoffId, TicketId};
use crate::records::{
    Artifact, AuditEntry, Notification, Project, Signoff, SyncRecord, Ticket,
};
use crate::status::EntityType;
use async_trait::async_trait;

/// Result alias for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Project rows
#[async_trait]
pub trait ProjectRepo: Send + Sync {
    /// Fetch by id
    async fn project(&self, id: ProjectId) -> StoreResult<Option<Project>>;

    /// Insert a new project
    async fn insert_project(&self, project: Project) -> StoreResult<()>;

    /// Replace an existing project row
    async fn update_project(&self, project: &Project) -> StoreResult<()>;

    /// Project currently linked to a tracker repository
    async fn project_by_repository(&self, repository_id: u64) -> StoreResult<Option<Project>>;
}

/// Artifact rows
#[async_trait]
pub trait ArtifactRepo: Send + Sync {
    /// Fetch by id
    async fn artifact(&self, id: ArtifactId) -> StoreResult<Option<Artifact>>;

    /// Insert a new artifact
    async fn insert_artifact(&self, artifact: Artifact) -> StoreResult<()>;

    /// Replace an existing artifact row
    async fn update_artifact(&self, artifact: &Artifact) -> StoreResult<()>;
}

/// Signoff rows
#[async_trait]
pub trait SignoffRepo: Send + Sync {
    /// Fetch by id
    async fn signoff(&self, id: SignoffId) -> StoreResult<Option<Signoff>>;

    /// Insert a new signoff
    async fn insert_signoff(&self, signoff: Signoff) -> StoreResult<()>;

    /// Replace an existing signoff row
    async fn update_signoff(&self, signoff: &Signoff) -> StoreResult<()>;

    /// Every signoff ever created for an artifact, oldest first
    async fn signoffs_for_artifact(&self, artifact_id: ArtifactId) -> StoreResult<Vec<Signoff>>;
}

/// Ticket rows
#[async_trait]
pub trait TicketRepo: Send + Sync {
    /// Fetch by id
    async fn ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>>;

    /// Insert a new ticket
    async fn insert_ticket(&self, ticket: Ticket) -> StoreResult<()>;

    /// Replace an existing ticket row
    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()>;
}

/// SyncRecord rows
#[async_trait]
pub trait SyncRecordRepo: Send + Sync {
    /// Lookup by the external uniqueness key
    async fn sync_record_by_external(
        &self,
        repository_id: u64,
        entity_type: EntityType,
        external_id: u64,
    ) -> StoreResult<Option<SyncRecord>>;

    /// Active record linked to a ticket
    async fn sync_record_by_ticket(
        &self,
        ticket_id: TicketId,
        entity_type: EntityType,
    ) -> StoreResult<Option<SyncRecord>>;

    /// All records owned by a project, including disconnected ones
    async fn sync_records_for_project(&self, project_id: ProjectId) -> StoreResult<Vec<SyncRecord>>;

    /// Insert; fails with [`StoreError::UniqueViolation`] on either key
    async fn insert_sync_record(&self, record: SyncRecord) -> StoreResult<()>;

    /// Replace an existing record; the ticket key is re-checked
    async fn update_sync_record(&self, record: &SyncRecord) -> StoreResult<()>;
}

/// Audit trail and notifications
#[async_trait]
pub trait AuditRepo: Send + Sync {
    /// Append an audit entry
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()>;

    /// Queue a notification
    async fn push_notification(&self, notification: Notification) -> StoreResult<()>;
}

/// Everything the engines need from persistence
pub trait Store:
    ProjectRepo + ArtifactRepo + SignoffRepo + TicketRepo + SyncRecordRepo + AuditRepo
{
}

impl<T> Store for T where
    T: ProjectRepo + ArtifactRepo + SignoffRepo + TicketRepo + SyncRecordRepo + AuditRepo
{
}
