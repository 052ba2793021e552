//! Delivery Model - records, statuses and the persistence seam
//!
//! Shared vocabulary for the workflow and sync engines:
//! - Typed identifiers for every record kind
//! - Project, artifact, signoff, ticket and status enums
//! - Roles and the authenticated principal
//! - SHA-256 content hashing for approval evidence
//! - `Store` repository traits and an in-memory implementation
//!
//! # Example
//!
//! ```rust
//! use delivery_model::{InMemoryStore, Project, ProjectRepo};
//!
//! # async fn example() -> Result<(), delivery_model::StoreError> {
//! let store = InMemoryStore::new();
//! let project = Project::new("Client portal");
//! let id = project.id;
//! store.insert_project(project).await?;
//! assert!(store.project(id).await?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod hash;
pub mod ids;
pub mod memory;
pub mod principal;
pub mod records;
pub mod status;
pub mod store;

pub use error::StoreError;
pub use hash::{ContentHash, HashError};
pub use ids::{ArtifactId, ProjectId, SignoffId, SyncRecordId, TicketId, UserId};
pub use memory::InMemoryStore;
pub use principal::{Principal, RequestMeta, Role};
pub use records::{
    ApprovalEvidence, Artifact, AuditEntry, Notification, Project, RepositoryLink, Signoff,
    SyncRecord, Ticket,
};
pub use status::{
    ArtifactStatus, EntityType, ProjectStatus, SignoffStatus, SyncDirection, SyncStatus,
    TicketPriority, TicketStatus, UnknownVariant,
};
pub use store::{
    ArtifactRepo, AuditRepo, ProjectRepo, SignoffRepo, Store, StoreResult, SyncRecordRepo,
    TicketRepo,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
