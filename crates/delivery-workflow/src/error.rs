//! Error types for the workflow engines
//!
//! Every variant except [`WorkflowError::Store`] and
//! [`WorkflowError::Integrity`] is operational: an expected outcome of a bad
//! request that the caller can act on.

use delivery_model::{HashError, ProjectStatus, StoreError};

/// Main workflow error type
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Malformed or missing input
    #[error("validation failed: {0}")]
    Validation(String),

    /// Principal lacks the required role or relationship
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Record is in the wrong state for the operation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Target status is not a successor of the current status
    #[error(
        "cannot move project from {from} to {to}; allowed transitions: {}",
        render_statuses(.allowed)
    )]
    InvalidTransition {
        /// Current status
        from: ProjectStatus,
        /// Requested status
        to: ProjectStatus,
        /// Successors of `from`
        allowed: Vec<ProjectStatus>,
    },

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Content hashing failure
    #[error("integrity hash failed: {0}")]
    Integrity(#[from] HashError),
}

impl WorkflowError {
    /// Not-found helper
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this is an expected, caller-facing failure
    #[inline]
    #[must_use]
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Integrity(_))
    }

    /// Whether retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// `["scoping","cancelled"]`
pub(crate) fn render_statuses(statuses: &[ProjectStatus]) -> String {
    let quoted: Vec<String> = statuses.iter().map(|s| format!("\"{s}\"")).collect();
    format!("[{}]", quoted.join(","))
}
