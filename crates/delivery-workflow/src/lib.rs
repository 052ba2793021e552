//! Delivery Workflow - project lifecycle and artifact sign-off
//!
//! Two engines over the shared [`Store`]:
//! - [`LifecycleEngine`]: validated, role-gated project status transitions
//! - [`ApprovalEngine`]: multi-approver sign-off rounds with delegation and
//!   content-hash evidence
//!
//! Audit entries and notifications are written after the primary change and
//! never fail the operation that produced them.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod approval;
pub mod authority;
pub mod error;
pub mod lifecycle;

pub use approval::{reduce_round, ApprovalEngine, DecisionOutcome, SignoffRequest, SignoffRound};
pub use authority::{authorize, is_authorized, is_elevated, Action, ELEVATED_ROLES};
pub use error::WorkflowError;
pub use lifecycle::{
    allowed_transitions, required_roles, validate_transition, AvailableTransitions,
    LifecycleEngine, TransitionOutcome,
};

use delivery_model::{AuditEntry, Notification, Store};

/// Prelude for common imports
pub mod prelude {
    pub use crate::approval::{ApprovalEngine, DecisionOutcome, SignoffRequest};
    pub use crate::error::WorkflowError;
    pub use crate::lifecycle::{LifecycleEngine, TransitionOutcome};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) async fn record_audit(store: &dyn Store, entry: AuditEntry) {
    let action = entry.action.clone();
    if let Err(e) = store.append_audit(entry).await {
        tracing::warn!(%action, error = %e, "failed to write audit entry");
    }
}

pub(crate) async fn notify(store: &dyn Store, notification: Notification) {
    let recipient = notification.recipient;
    if let Err(e) = store.push_notification(notification).await {
        tracing::warn!(%recipient, error = %e, "failed to queue notification");
    }
}
