//! Role authority
//!
//! Answers "may this role perform this action?" from fixed tables. Nothing
//! here touches the store or fails on its own; callers decide what a `false`
//! means.

use crate::error::WorkflowError;
use delivery_model::Role;
use serde::{Deserialize, Serialize};

/// Roles that bypass every per-action check
pub const ELEVATED_ROLES: &[Role] = &[Role::SystemAdmin, Role::OrgAdmin];

/// Actions gated by role outside the lifecycle table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Open a sign-off round on an artifact
    RequestSignoff,
    /// Push a ticket to the tracker
    SyncTicket,
    /// Pull every tracker issue into tickets
    PullIssues,
    /// Link a project to a tracker repository
    ConnectRepository,
    /// Remove a project's repository link
    DisconnectRepository,
}

const ACTION_ROLES: &[(Action, &[Role])] = &[
    (
        Action::RequestSignoff,
        &[Role::Developer, Role::TechLead, Role::ProjectManager],
    ),
    (
        Action::SyncTicket,
        &[Role::Developer, Role::TechLead, Role::ProjectManager],
    ),
    (Action::PullIssues, &[Role::TechLead, Role::ProjectManager]),
    (Action::ConnectRepository, &[Role::TechLead, Role::ProjectManager]),
    (Action::DisconnectRepository, &[Role::TechLead, Role::ProjectManager]),
];

impl Action {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestSignoff => "request_signoff",
            Self::SyncTicket => "sync_ticket",
            Self::PullIssues => "pull_issues",
            Self::ConnectRepository => "connect_repository",
            Self::DisconnectRepository => "disconnect_repository",
        }
    }

    /// Roles allowed to perform this action
    #[must_use]
    pub fn required_roles(&self) -> &'static [Role] {
        ACTION_ROLES
            .iter()
            .find(|(action, _)| action == self)
            .map(|(_, roles)| *roles)
            .unwrap_or(&[])
    }
}

/// Whether `role` bypasses role checks
#[inline]
#[must_use]
pub fn is_elevated(role: Role) -> bool {
    ELEVATED_ROLES.contains(&role)
}

/// Whether `role` satisfies `required`
#[inline]
#[must_use]
pub fn is_authorized(role: Role, required: &[Role]) -> bool {
    is_elevated(role) || required.contains(&role)
}

/// Check an [`Action`] for `role`
///
/// # Errors
/// [`WorkflowError::Unauthorized`] when the role is not permitted
pub fn authorize(role: Role, action: Action) -> Result<(), WorkflowError> {
    if is_authorized(role, action.required_roles()) {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized(format!(
            "role {role} may not perform {}",
            action.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevated_roles_bypass_everything() {
        for role in ELEVATED_ROLES {
            assert!(is_authorized(*role, &[]));
            assert!(is_authorized(*role, &[Role::Client]));
        }
    }

    #[test]
    fn other_roles_need_membership() {
        assert!(is_authorized(Role::Client, &[Role::Client, Role::ClientAdmin]));
        assert!(!is_authorized(Role::Developer, &[Role::ProjectManager]));
        assert!(!is_authorized(Role::ProjectManager, &[]));
    }

    #[test]
    fn every_action_has_a_table_entry() {
        for action in [
            Action::RequestSignoff,
            Action::SyncTicket,
            Action::PullIssues,
            Action::ConnectRepository,
            Action::DisconnectRepository,
        ] {
            assert!(!action.required_roles().is_empty(), "{action:?}");
        }
    }

    #[test]
    fn authorize_reports_role_and_action() {
        let err = authorize(Role::Client, Action::RequestSignoff).unwrap_err();
        assert_eq!(
            err.to_string(),
            "not authorized: role client may not perform request_signoff"
        );
        assert!(authorize(Role::Developer, Action::RequestSignoff).is_ok());
        assert!(authorize(Role::OrgAdmin, Action::PullIssues).is_ok());
    }
}
