//! `POST /api/sync`
//!
//! Role checks happen here; the orchestrator itself is role-agnostic so the
//! webhook path can share it.

use super::to_data;
use crate::error::ApiError;
use crate::state::AppState;
use delivery_model::{Principal, ProjectId, TicketId};
use delivery_workflow::{authorize, Action};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SyncRequest {
    #[serde(rename_all = "camelCase")]
    SyncTicket { ticket_id: TicketId },
    #[serde(rename_all = "camelCase")]
    PullIssues { project_id: ProjectId },
    #[serde(rename_all = "camelCase")]
    ConnectRepository {
        project_id: ProjectId,
        owner: String,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    DisconnectRepository { project_id: ProjectId },
}

impl SyncRequest {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::SyncTicket { .. } => Action::SyncTicket,
            Self::PullIssues { .. } => Action::PullIssues,
            Self::ConnectRepository { .. } => Action::ConnectRepository,
            Self::DisconnectRepository { .. } => Action::DisconnectRepository,
        }
    }
}

/// Run one sync action after the role check
///
/// # Errors
/// [`ApiError::Authorization`] for roles outside the action's set, otherwise
/// the orchestrator's error
pub async fn dispatch(
    state: &AppState,
    principal: &Principal,
    request: SyncRequest,
) -> Result<Value, ApiError> {
    authorize(principal.role, request.action())?;

    match request {
        SyncRequest::SyncTicket { ticket_id } => {
            to_data(&state.sync.sync_ticket(ticket_id).await?)
        }
        SyncRequest::PullIssues { project_id } => {
            let report = state.sync.pull_issues(project_id).await?;
            tracing::info!(
                project = %project_id,
                total = report.total,
                synced = report.synced(),
                skipped = report.skipped.len(),
                "bulk pull finished"
            );
            to_data(&report)
        }
        SyncRequest::ConnectRepository {
            project_id,
            owner,
            name,
        } => to_data(&state.sync.connect_repository(project_id, &owner, &name).await?),
        SyncRequest::DisconnectRepository { project_id } => {
            let disconnected = state.sync.disconnect_repository(project_id).await?;
            Ok(json!({ "projectId": project_id, "disconnectedRecords": disconnected }))
        }
    }
}
