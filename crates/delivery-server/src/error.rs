//! Caller-facing error classification
//!
//! Engine errors are normalized into [`ApiError`], which owns the HTTP status,
//! the stable error code and any structured details rendered in the envelope.

use delivery_model::ProjectStatus;
use delivery_sync::{SyncError, WebhookError};
use delivery_workflow::WorkflowError;
use serde_json::{json, Value};
use warp::http::StatusCode;

/// Error rendered into a failure envelope
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Target status is not a successor; details carry the allowed set
    #[error("{message}")]
    InvalidTransition {
        message: String,
        from: ProjectStatus,
        to: ProjectStatus,
        allowed: Vec<ProjectStatus>,
    },

    /// Tracker call failed
    #[error("{message}")]
    ExternalService { message: String, retryable: bool },

    /// Anything unexpected; the message is logged, never returned
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for the envelope
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to the caller
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Structured details, if any
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidTransition {
                from, to, allowed, ..
            } => Some(json!({ "from": from, "to": to, "allowed": allowed })),
            Self::ExternalService { retryable, .. } => Some(json!({ "retryable": retryable })),
            _ => None,
        }
    }

    /// Expected failures log at warn; the rest at error
    #[inline]
    #[must_use]
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService { retryable: true, .. })
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::Validation(m) => Self::Validation(m),
            WorkflowError::Unauthorized(m) => Self::Authorization(m),
            WorkflowError::NotFound { .. } => Self::NotFound(message),
            WorkflowError::Conflict(m) => Self::Conflict(m),
            WorkflowError::InvalidTransition { from, to, allowed } => Self::InvalidTransition {
                message,
                from,
                to,
                allowed,
            },
            WorkflowError::Store(_) | WorkflowError::Integrity(_) => Self::Internal(message),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match err {
            SyncError::Validation(m) => Self::Validation(m),
            SyncError::NotFound { .. } => Self::NotFound(message),
            SyncError::Conflict(m) => Self::Conflict(m),
            SyncError::External(e) => Self::ExternalService {
                retryable: e.is_retryable(),
                message,
            },
            SyncError::Store(_) => Self::Internal(message),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        if err.is_authentication() {
            return Self::Authentication(err.to_string());
        }
        match err {
            WebhookError::Sync(e) => e.into(),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delivery_model::StoreError;
    use delivery_sync::TrackerError;

    #[test]
    fn status_codes() {
        let cases = [
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ApiError::ExternalService {
                    message: "x".into(),
                    retryable: false,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err.code());
        }
    }

    #[test]
    fn invalid_transition_carries_allowed_set() {
        let err: ApiError = WorkflowError::InvalidTransition {
            from: ProjectStatus::Draft,
            to: ProjectStatus::PocPhase,
            allowed: vec![ProjectStatus::Scoping, ProjectStatus::Cancelled],
        }
        .into();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(
            err.details().unwrap()["allowed"],
            json!(["scoping", "cancelled"])
        );
    }

    #[test]
    fn unauthorized_workflow_is_forbidden() {
        let err: ApiError = WorkflowError::Unauthorized("role client".into()).into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn tracker_failures_are_bad_gateway() {
        let err: ApiError = SyncError::External(TrackerError::Timeout("slow".into())).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_retryable());
        assert!(err.is_operational());
    }

    #[test]
    fn store_failures_hide_details() {
        let err: ApiError = SyncError::Store(StoreError::Backend("disk on fire".into())).into();
        assert!(!err.is_operational());
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn webhook_errors() {
        assert_eq!(
            ApiError::from(WebhookError::InvalidSignature).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(WebhookError::MissingEvent).status_code(),
            StatusCode::BAD_REQUEST
        );
        let nested = WebhookError::Sync(SyncError::Conflict("busy".into()));
        assert_eq!(ApiError::from(nested).status_code(), StatusCode::CONFLICT);
    }
}
