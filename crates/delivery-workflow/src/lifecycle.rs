//! Project lifecycle state machine
//!
//! ```text
//! draft → scoping → sow_draft → sow_review → [poc_phase →] development
//!       → uat_phase → sign_off → completed
//! ```
//!
//! The proof-of-concept phase may be skipped. `cancelled` is reachable from
//! every non-terminal status, and three rework edges point backwards:
//! `sow_review → sow_draft`, `uat_phase → development`, `sign_off → uat_phase`.
//!
//! Both the successor table and the role table are data; adding a status is a
//! table edit.

use crate::authority::is_authorized;
use crate::error::WorkflowError;
use chrono::{NaiveDate, Utc};
use delivery_model::{AuditEntry, Principal, ProjectId, ProjectStatus, Role, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use ProjectStatus::{
    Cancelled, Completed, Development, Draft, PocPhase, Scoping, SignOff, SowDraft, SowReview,
    UatPhase,
};

const TRANSITIONS: &[(ProjectStatus, &[ProjectStatus])] = &[
    (Draft, &[Scoping, Cancelled]),
    (Scoping, &[SowDraft, Cancelled]),
    (SowDraft, &[SowReview, Cancelled]),
    (SowReview, &[PocPhase, Development, SowDraft, Cancelled]),
    (PocPhase, &[Development, Cancelled]),
    (Development, &[UatPhase, Cancelled]),
    (UatPhase, &[SignOff, Development, Cancelled]),
    (SignOff, &[Completed, UatPhase, Cancelled]),
    (Completed, &[]),
    (Cancelled, &[]),
];

const TARGET_ROLES: &[(ProjectStatus, &[Role])] = &[
    (SowReview, &[Role::ProjectManager]),
    (PocPhase, &[Role::ProjectManager, Role::TechLead]),
    (Development, &[Role::ProjectManager, Role::TechLead]),
    (SignOff, &[Role::ClientAdmin, Role::Client]),
    (Completed, &[Role::ProjectManager, Role::ClientAdmin]),
    (Cancelled, &[Role::ProjectManager]),
];

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: ProjectStatus) -> &'static [ProjectStatus] {
    TRANSITIONS
        .iter()
        .find(|(status, _)| *status == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

/// Roles required to move a project into `target`, if the target is gated
#[must_use]
pub fn required_roles(target: ProjectStatus) -> Option<&'static [Role]> {
    TARGET_ROLES
        .iter()
        .find(|(status, _)| *status == target)
        .map(|(_, roles)| *roles)
}

/// Check `from → to` against the successor table
///
/// # Errors
/// [`WorkflowError::InvalidTransition`] listing the allowed successors
pub fn validate_transition(from: ProjectStatus, to: ProjectStatus) -> Result<(), WorkflowError> {
    let allowed = allowed_transitions(from);
    if allowed.contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            from,
            to,
            allowed: allowed.to_vec(),
        })
    }
}

/// Result of an applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub project_id: ProjectId,
    pub previous_status: ProjectStatus,
    pub status: ProjectStatus,
    pub actual_end_date: Option<NaiveDate>,
}

/// Current status plus the moves available from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransitions {
    pub project_id: ProjectId,
    pub status: ProjectStatus,
    pub allowed: Vec<ProjectStatus>,
}

/// Validates and applies project status changes
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine").finish_non_exhaustive()
    }
}

impl LifecycleEngine {
    /// Create engine over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Move a project to `target`
    ///
    /// # Errors
    /// - [`WorkflowError::NotFound`] if the project does not exist
    /// - [`WorkflowError::InvalidTransition`] if `target` is not a successor
    /// - [`WorkflowError::Unauthorized`] if the target is role-gated
    /// - [`WorkflowError::Store`] on persistence failure
    pub async fn transition(
        &self,
        principal: &Principal,
        project_id: ProjectId,
        target: ProjectStatus,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let mut project = self
            .store
            .project(project_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("project", project_id))?;

        let previous = project.status;
        validate_transition(previous, target)?;

        if let Some(roles) = required_roles(target) {
            if !is_authorized(principal.role, roles) {
                return Err(WorkflowError::Unauthorized(format!(
                    "role {} may not move a project into {target}",
                    principal.role
                )));
            }
        }

        project.status = target;
        if target == Completed {
            project.actual_end_date = Some(Utc::now().date_naive());
        }
        project.updated_at = Utc::now();
        self.store.update_project(&project).await?;

        tracing::info!(
            project = %project_id,
            from = %previous,
            to = %target,
            actor = %principal.user_id,
            "project transitioned"
        );

        let entry = AuditEntry::system("project.transition", "project", project_id)
            .by(principal.user_id, principal.role)
            .change(
                json!({ "status": previous }),
                json!({ "status": target, "actual_end_date": project.actual_end_date }),
            );
        crate::record_audit(self.store.as_ref(), entry).await;

        Ok(TransitionOutcome {
            project_id,
            previous_status: previous,
            status: target,
            actual_end_date: project.actual_end_date,
        })
    }

    /// Report the transitions currently available to a project
    ///
    /// # Errors
    /// [`WorkflowError::NotFound`] if the project does not exist
    pub async fn available_transitions(
        &self,
        project_id: ProjectId,
    ) -> Result<AvailableTransitions, WorkflowError> {
        let project = self
            .store
            .project(project_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("project", project_id))?;

        Ok(AvailableTransitions {
            project_id,
            status: project.status,
            allowed: allowed_transitions(project.status).to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_has_a_row() {
        for status in ProjectStatus::ALL {
            assert!(
                TRANSITIONS.iter().any(|(from, _)| from == status),
                "missing row for {status}"
            );
        }
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        for status in ProjectStatus::ALL.iter().filter(|s| s.is_terminal()) {
            assert!(allowed_transitions(*status).is_empty());
        }
    }

    #[test]
    fn every_non_terminal_status_can_cancel() {
        for status in ProjectStatus::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(allowed_transitions(*status).contains(&Cancelled), "{status}");
        }
    }

    #[test]
    fn rework_edges() {
        assert!(validate_transition(SowReview, SowDraft).is_ok());
        assert!(validate_transition(UatPhase, Development).is_ok());
        assert!(validate_transition(SignOff, UatPhase).is_ok());
        assert!(validate_transition(Development, Scoping).is_err());
    }

    #[test]
    fn draft_to_poc_lists_allowed() {
        match validate_transition(Draft, PocPhase) {
            Err(WorkflowError::InvalidTransition { allowed, .. }) => {
                assert_eq!(allowed, vec![Scoping, Cancelled]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn gated_targets() {
        assert_eq!(required_roles(SowReview), Some(&[Role::ProjectManager][..]));
        assert!(required_roles(SignOff).unwrap().contains(&Role::Client));
        assert!(required_roles(Scoping).is_none());
    }
}
