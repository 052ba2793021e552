//! Authenticated caller identity
//!
//! Authentication itself happens upstream; by the time a request reaches an
//! engine it carries a verified [`Principal`] and, for decisions that must be
//! non-repudiable, the [`RequestMeta`] it arrived with.

use crate::ids::UserId;
use crate::status::UnknownVariant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform role resolved by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Operator of the whole platform
    SystemAdmin,
    /// Administrator of the delivering organization
    OrgAdmin,
    /// Project manager
    ProjectManager,
    /// Technical lead
    TechLead,
    /// Developer
    Developer,
    /// Administrator on the client side
    ClientAdmin,
    /// Client stakeholder
    Client,
}

impl Role {
    /// Every role
    pub const ALL: &'static [Role] = &[
        Role::SystemAdmin,
        Role::OrgAdmin,
        Role::ProjectManager,
        Role::TechLead,
        Role::Developer,
        Role::ClientAdmin,
        Role::Client,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::OrgAdmin => "org_admin",
            Role::ProjectManager => "project_manager",
            Role::TechLead => "tech_lead",
            Role::Developer => "developer",
            Role::ClientAdmin => "client_admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "role",
                value: s.to_string(),
            })
    }
}

/// Verified caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user
    pub user_id: UserId,
    /// Role resolved for this request
    pub role: Role,
}

impl Principal {
    /// Create principal
    #[inline]
    #[must_use]
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Transport facts captured for audit and non-repudiation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Originating client address
    pub ip_address: Option<String>,
    /// Originating user agent
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// Create request metadata
    #[inline]
    #[must_use]
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
    }
}
