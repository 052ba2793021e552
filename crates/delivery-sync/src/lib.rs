//! Delivery Sync - ticket ⇄ issue tracker synchronization
//!
//! - [`mapper`]: pure field mapping between tickets and issues
//! - [`IssueTracker`]: tracker seam, with a GitHub REST implementation
//! - [`SyncOrchestrator`]: idempotent outbound/inbound sync and bulk pull
//! - [`webhook`]: HMAC-verified webhook ingestion
//!
//! # Example
//!
//! ```rust,no_run
//! use delivery_sync::{GitHubClient, GitHubConfig, SyncOrchestrator};
//! use delivery_model::{InMemoryStore, TicketId};
//! use secrecy::SecretString;
//! use std::sync::Arc;
//!
//! # async fn example(ticket: TicketId) -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = GitHubClient::new(GitHubConfig::new(SecretString::from("ghp_token")))?;
//! let sync = SyncOrchestrator::new(Arc::new(InMemoryStore::new()), Arc::new(tracker));
//! let outcome = sync.sync_ticket(ticket).await?;
//! println!("issue #{}", outcome.issue_number);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod github;
pub mod mapper;
pub mod orchestrator;
pub mod tracker;
pub mod webhook;

pub use error::{SyncError, TrackerError, WebhookError};
pub use github::{GitHubClient, GitHubConfig, DEFAULT_API_BASE};
pub use orchestrator::{BulkSyncReport, SkippedIssue, SyncAction, SyncOrchestrator, SyncOutcome};
pub use tracker::{Issue, IssueState, IssueTracker, IssueUpdate, Label, NewIssue, Owner, Repository};
pub use webhook::{SignatureValidator, WebhookDelivery, WebhookHandler, WebhookOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
