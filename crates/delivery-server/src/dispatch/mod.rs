//! Action-discriminated request bodies and their dispatch
//!
//! Each endpoint accepts `{"action": "<name>", ...}` with camelCase fields and
//! routes it to one engine call. The result is serialized into the envelope's
//! `data`.

pub mod sync;
pub mod workflow;

pub use sync::SyncRequest;
pub use workflow::WorkflowRequest;

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Decode a request body, reporting serde's message as a validation error
///
/// # Errors
/// [`ApiError::Validation`] on malformed JSON, an unknown action or a missing
/// field
pub fn parse_request<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("request body is required".into()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(format!("encode response: {e}")))
}
