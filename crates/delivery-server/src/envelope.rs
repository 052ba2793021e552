//! Response envelope shared by every JSON endpoint

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// `{success, data, requestId}` or `{success, error, requestId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub request_id: Uuid,
}

/// Failure payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

impl Envelope {
    #[must_use]
    pub fn success(data: Value, request_id: Uuid) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id,
        }
    }

    #[must_use]
    pub fn failure(err: &ApiError, request_id: Uuid) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: err.code().to_string(),
                message: err.public_message(),
                details: err.details(),
            }),
            request_id,
        }
    }
}

/// Log the outcome of `operation` and render it
pub fn respond(operation: &str, request_id: Uuid, result: Result<Value, ApiError>) -> Response {
    match result {
        Ok(data) => {
            tracing::debug!(%request_id, operation, "request succeeded");
            reply(StatusCode::OK, &Envelope::success(data, request_id))
        }
        Err(err) => failure(operation, request_id, &err),
    }
}

/// Log and render a failure
pub fn failure(operation: &str, request_id: Uuid, err: &ApiError) -> Response {
    if err.is_operational() {
        tracing::warn!(%request_id, operation, code = err.code(), error = %err, "request failed");
    } else {
        tracing::error!(%request_id, operation, error = %err, "request failed unexpectedly");
    }
    reply(err.status_code(), &Envelope::failure(err, request_id))
}

fn reply(status: StatusCode, envelope: &Envelope) -> Response {
    warp::reply::with_status(warp::reply::json(envelope), status).into_response()
}
