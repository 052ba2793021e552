//! Persisted workflow records
//!
//! These mirror the rows the engines read and write. Creation of projects,
//! artifacts and tickets by end users happens elsewhere; the constructors here
//! exist for the engines' own inserts and for fixtures.

use crate::hash::ContentHash;
use crate::ids::{ArtifactId, ProjectId, SignoffId, SyncRecordId, TicketId, UserId};
use crate::principal::Role;
use crate::status::{
    ArtifactStatus, EntityType, ProjectStatus, SignoffStatus, SyncDirection, SyncStatus,
    TicketPriority, TicketStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Link from a project to an external tracker repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLink {
    /// Tracker-assigned numeric repository id (stable across renames)
    pub id: u64,
    /// Owning account or organization
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepositoryLink {
    /// Create link
    #[must_use]
    pub fn new(id: u64, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Delivery project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub actual_end_date: Option<NaiveDate>,
    pub repository: Option<RepositoryLink>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// New project in `draft`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            status: ProjectStatus::Draft,
            actual_end_date: None,
            repository: None,
            updated_at: Utc::now(),
        }
    }

    /// Start from a given status
    #[must_use]
    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach a repository link
    #[must_use]
    pub fn with_repository(mut self, repository: RepositoryLink) -> Self {
        self.repository = Some(repository);
        self
    }
}

/// Document subject to sign-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: ArtifactStatus,
    /// Content snapshot of the current version
    pub content: serde_json::Value,
    pub version: u32,
    /// Incremented by every sign-off request; signoffs of older rounds no
    /// longer count toward the artifact's status
    pub review_round: u32,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// New draft artifact, version 1
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        title: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            project_id,
            title: title.into(),
            status: ArtifactStatus::Draft,
            content,
            version: 1,
            review_round: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Integrity evidence captured when a signoff is approved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvidence {
    pub content_hash: ContentHash,
    pub artifact_version: u32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One approver's record against one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signoff {
    pub id: SignoffId,
    pub artifact_id: ArtifactId,
    pub review_round: u32,
    pub assignee: UserId,
    pub delegated_to: Option<UserId>,
    pub requested_by: UserId,
    pub status: SignoffStatus,
    pub comments: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub decision_at: Option<DateTime<Utc>>,
    pub evidence: Option<ApprovalEvidence>,
    pub created_at: DateTime<Utc>,
}

impl Signoff {
    /// New pending signoff
    #[must_use]
    pub fn pending(
        artifact_id: ArtifactId,
        review_round: u32,
        assignee: UserId,
        requested_by: UserId,
        due_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: SignoffId::new(),
            artifact_id,
            review_round,
            assignee,
            delegated_to: None,
            requested_by,
            status: SignoffStatus::Pending,
            comments: None,
            due_date,
            decision_at: None,
            evidence: None,
            created_at: Utc::now(),
        }
    }

    /// Whether `user` may decide this signoff
    #[inline]
    #[must_use]
    pub fn is_decider(&self, user: UserId) -> bool {
        self.assignee == user || self.delegated_to == Some(user)
    }
}

/// Internal unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub labels: Vec<String>,
    pub external_issue_number: Option<u64>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// New open, medium-priority ticket
    #[must_use]
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            id: TicketId::new(),
            project_id,
            title: title.into(),
            description: String::new(),
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            labels: Vec::new(),
            external_issue_number: None,
            last_synced_at: None,
            updated_at: Utc::now(),
        }
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With status
    #[must_use]
    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = status;
        self
    }

    /// With priority
    #[must_use]
    pub fn with_priority(mut self, priority: TicketPriority) -> Self {
        self.priority = priority;
        self
    }

    /// With free-text labels
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Durable mapping between an internal entity and its tracker counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: SyncRecordId,
    pub project_id: ProjectId,
    pub repository_id: u64,
    pub entity_type: EntityType,
    pub external_id: u64,
    pub ticket_id: Option<TicketId>,
    pub direction: SyncDirection,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl SyncRecord {
    /// New issue mapping, marked synced now
    #[must_use]
    pub fn issue(
        project_id: ProjectId,
        repository_id: u64,
        issue_number: u64,
        ticket_id: Option<TicketId>,
        direction: SyncDirection,
    ) -> Self {
        Self {
            id: SyncRecordId::new(),
            project_id,
            repository_id,
            entity_type: EntityType::Issue,
            external_id: issue_number,
            ticket_id,
            direction,
            sync_status: SyncStatus::Synced,
            last_error: None,
            last_synced_at: Utc::now(),
        }
    }

    /// Uniqueness key on the external side
    #[inline]
    #[must_use]
    pub fn external_key(&self) -> (u64, EntityType, u64) {
        (self.repository_id, self.entity_type, self.external_id)
    }

    /// Whether the mapping still participates in sync
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.sync_status != SyncStatus::Disconnected
    }

    /// Record a successful sync in `direction`
    pub fn mark_synced(&mut self, direction: SyncDirection) {
        self.direction = self.direction.merge(direction);
        self.sync_status = SyncStatus::Synced;
        self.last_error = None;
        self.last_synced_at = Utc::now();
    }
}

/// Append-only audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Option<UserId>,
    pub actor_role: Option<Role>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry without actor; system-initiated changes such as webhooks
    #[must_use]
    pub fn system(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            actor: None,
            actor_role: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            before: None,
            after: None,
            ip_address: None,
            user_agent: None,
            at: Utc::now(),
        }
    }

    /// Attribute to a user
    #[must_use]
    pub fn by(mut self, actor: UserId, role: Role) -> Self {
        self.actor = Some(actor);
        self.actor_role = Some(role);
        self
    }

    /// Before/after snapshots
    #[must_use]
    pub fn change(mut self, before: serde_json::Value, after: serde_json::Value) -> Self {
        self.before = Some(before);
        self.after = Some(after);
        self
    }

    /// Transport metadata
    #[must_use]
    pub fn from_request(mut self, meta: &crate::principal::RequestMeta) -> Self {
        self.ip_address.clone_from(&meta.ip_address);
        self.user_agent.clone_from(&meta.user_agent);
        self
    }
}

/// In-app notification addressed to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub kind: String,
    pub title: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create notification
    #[must_use]
    pub fn new(recipient: UserId, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            recipient,
            kind: kind.into(),
            title: title.into(),
            link: None,
            created_at: Utc::now(),
        }
    }

    /// With deep link
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
