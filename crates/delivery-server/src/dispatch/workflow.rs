//! `POST /api/workflow`

use super::to_data;
use crate::error::ApiError;
use crate::state::AppState;
use delivery_model::{Principal, ProjectId, ProjectStatus, RequestMeta, SignoffId, UserId};
use delivery_workflow::SignoffRequest;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkflowRequest {
    #[serde(rename_all = "camelCase")]
    Transition {
        project_id: ProjectId,
        target_status: ProjectStatus,
    },
    #[serde(rename_all = "camelCase")]
    AvailableTransitions { project_id: ProjectId },
    RequestSignoff(SignoffRequest),
    #[serde(rename_all = "camelCase")]
    Approve {
        signoff_id: SignoffId,
        comments: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Reject {
        signoff_id: SignoffId,
        comments: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RequestChanges {
        signoff_id: SignoffId,
        comments: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Delegate {
        signoff_id: SignoffId,
        delegate_to: UserId,
        comments: Option<String>,
    },
}

impl WorkflowRequest {
    /// Wire name of the action, for logs
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Transition { .. } => "transition",
            Self::AvailableTransitions { .. } => "availableTransitions",
            Self::RequestSignoff(_) => "requestSignoff",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::RequestChanges { .. } => "requestChanges",
            Self::Delegate { .. } => "delegate",
        }
    }
}

/// Run one workflow action
///
/// # Errors
/// The engine's error, normalized
pub async fn dispatch(
    state: &AppState,
    principal: &Principal,
    meta: &RequestMeta,
    request: WorkflowRequest,
) -> Result<Value, ApiError> {
    match request {
        WorkflowRequest::Transition {
            project_id,
            target_status,
        } => to_data(
            &state
                .lifecycle
                .transition(principal, project_id, target_status)
                .await?,
        ),
        WorkflowRequest::AvailableTransitions { project_id } => {
            to_data(&state.lifecycle.available_transitions(project_id).await?)
        }
        WorkflowRequest::RequestSignoff(request) => to_data(
            &state
                .approvals
                .create_signoff_request(principal, request)
                .await?,
        ),
        WorkflowRequest::Approve {
            signoff_id,
            comments,
        } => to_data(
            &state
                .approvals
                .approve(principal, signoff_id, comments, meta)
                .await?,
        ),
        WorkflowRequest::Reject {
            signoff_id,
            comments,
        } => to_data(
            &state
                .approvals
                .reject(principal, signoff_id, comments, meta)
                .await?,
        ),
        WorkflowRequest::RequestChanges {
            signoff_id,
            comments,
        } => to_data(
            &state
                .approvals
                .request_changes(principal, signoff_id, comments, meta)
                .await?,
        ),
        WorkflowRequest::Delegate {
            signoff_id,
            delegate_to,
            comments,
        } => to_data(
            &state
                .approvals
                .delegate(principal, signoff_id, delegate_to, comments, meta)
                .await?,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::parse_request;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_actions() {
        let project = ProjectId::new();
        let body = json!({
            "action": "transition",
            "projectId": project,
            "targetStatus": "sow_review"
        });
        let request: WorkflowRequest = parse_request(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            request,
            WorkflowRequest::Transition {
                project_id: project,
                target_status: ProjectStatus::SowReview,
            }
        );
    }

    #[test]
    fn request_signoff_flattens_fields() {
        let body = json!({
            "action": "requestSignoff",
            "artifactId": uuid::Uuid::new_v4(),
            "approverIds": [uuid::Uuid::new_v4()],
            "dueDate": "2026-11-30"
        });
        let request: WorkflowRequest = parse_request(body.to_string().as_bytes()).unwrap();
        assert_eq!(request.action(), "requestSignoff");
    }

    #[test]
    fn comments_are_optional() {
        let body = json!({ "action": "approve", "signoffId": uuid::Uuid::new_v4() });
        let request: WorkflowRequest = parse_request(body.to_string().as_bytes()).unwrap();
        assert!(matches!(request, WorkflowRequest::Approve { comments: None, .. }));
    }

    #[test]
    fn unknown_action_is_validation() {
        let err = parse_request::<WorkflowRequest>(br#"{"action":"archive"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = parse_request::<WorkflowRequest>(b"").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
