//! Error types for tracker access, synchronization and webhook ingestion

use delivery_model::StoreError;

/// Failure talking to the external tracker
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// Request exceeded the configured timeout
    #[error("tracker request timed out: {0}")]
    Timeout(String),

    /// Tracker answered with a non-success status
    #[error("tracker API error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Connection-level failure
    #[error("tracker transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("tracker response decode failed: {0}")]
    Decode(String),

    /// Client could not be constructed
    #[error("tracker client configuration error: {0}")]
    Configuration(String),
}

impl TrackerError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Configuration(_) => false,
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout(value.to_string())
        } else if value.is_decode() {
            Self::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Http {
                status: status.as_u16(),
                message: value.to_string(),
            }
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Main synchronization error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Request cannot be served in the current configuration
    #[error("validation failed: {0}")]
    Validation(String),

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

    /// Tracker call failed
    #[error("external service error: {0}")]
    External(#[from] TrackerError),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
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
        !matches!(self, Self::Store(_))
    }

    /// Whether retrying the same call may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::External(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            Self::Validation(_) | Self::NotFound { .. } | Self::Conflict(_) => false,
        }
    }
}

/// Failure ingesting a webhook delivery
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The `X-Hub-Signature-256` header is missing
    #[error("missing signature header")]
    MissingSignature,

    /// The signature header is not `sha256=<hex>`
    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    /// HMAC verification failed
    #[error("invalid signature")]
    InvalidSignature,

    /// The `X-GitHub-Event` header is missing
    #[error("missing event header")]
    MissingEvent,

    /// Body is not a valid payload for the event
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Signature was valid but applying the event failed
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl WebhookError {
    /// Whether the delivery was rejected as unauthenticated
    #[inline]
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature | Self::InvalidSignatureFormat(_) | Self::InvalidSignature
        )
    }
}
