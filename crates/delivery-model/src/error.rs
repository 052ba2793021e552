//! Persistence errors

/// Errors surfaced by a [`Store`](crate::store::Store) implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("unique constraint violated on {constraint}: {key}")]
    UniqueViolation {
        /// Constraint name
        constraint: &'static str,
        /// Offending key, rendered
        key: String,
    },

    /// Update targeted a row that does not exist
    #[error("{entity} {id} does not exist")]
    MissingRow {
        /// Table or record kind
        entity: &'static str,
        /// Row key
        id: String,
    },

    /// Store unreachable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Anything else the backend reports
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error came from a uniqueness guard
    #[inline]
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Whether retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
