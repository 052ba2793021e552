//! Status vocabularies for every workflow record
//!
//! All statuses serialize as their `snake_case` wire names, which are also the
//! strings stored in the relational store and shown in error messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    /// Which vocabulary was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire name of this variant
            #[inline]
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Project pipeline status, in pipeline order
    ProjectStatus as "project status" {
        /// Created, nothing agreed yet
        Draft => "draft",
        /// Requirements gathering
        Scoping => "scoping",
        /// Statement of work being written
        SowDraft => "sow_draft",
        /// Statement of work under review
        SowReview => "sow_review",
        /// Proof of concept
        PocPhase => "poc_phase",
        /// Main build
        Development => "development",
        /// User acceptance testing
        UatPhase => "uat_phase",
        /// Awaiting client sign-off
        SignOff => "sign_off",
        /// Delivered
        Completed => "completed",
        /// Abandoned
        Cancelled => "cancelled",
    }
}

impl ProjectStatus {
    /// Terminal statuses admit no further transition
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

wire_enum! {
    /// Artifact approval status
    ArtifactStatus as "artifact status" {
        /// Being authored or revised
        Draft => "draft",
        /// Sign-off requested, decisions outstanding
        PendingReview => "pending_review",
        /// Every signoff of the current round approved
        Approved => "approved",
        /// At least one signoff of the current round rejected
        Rejected => "rejected",
        /// Replaced by a newer version
        Superseded => "superseded",
    }
}

wire_enum! {
    /// Individual signoff status
    SignoffStatus as "signoff status" {
        /// Awaiting the assignee
        Pending => "pending",
        /// Approved
        Approved => "approved",
        /// Rejected
        Rejected => "rejected",
        /// Handed to a delegate who has not decided yet
        Delegated => "delegated",
    }
}

impl SignoffStatus {
    /// Whether a decision can still be recorded against this signoff
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Delegated)
    }
}

wire_enum! {
    /// Ticket workflow status
    TicketStatus as "ticket status" {
        /// Not started
        Open => "open",
        /// Being worked on
        InProgress => "in_progress",
        /// Waiting on something
        Blocked => "blocked",
        /// In review
        Review => "review",
        /// Finished
        Done => "done",
        /// Dropped
        Cancelled => "cancelled",
    }
}

wire_enum! {
    /// Ticket priority
    TicketPriority as "ticket priority" {
        /// Low
        Low => "low",
        /// Medium
        Medium => "medium",
        /// High
        High => "high",
        /// Critical
        Critical => "critical",
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

wire_enum! {
    /// Which side first created a synced pair
    SyncDirection as "sync direction" {
        /// Created from the external tracker
        Inbound => "inbound",
        /// Created from an internal ticket
        Outbound => "outbound",
        /// Synced in both directions since creation
        Bilateral => "bilateral",
    }
}

impl SyncDirection {
    /// Direction after a sync in `direction` touches a record created as `self`
    #[inline]
    #[must_use]
    pub const fn merge(self, direction: SyncDirection) -> SyncDirection {
        match (self, direction) {
            (Self::Inbound, Self::Inbound) => Self::Inbound,
            (Self::Outbound, Self::Outbound) => Self::Outbound,
            _ => Self::Bilateral,
        }
    }
}

wire_enum! {
    /// Health of a sync mapping
    SyncStatus as "sync status" {
        /// Last sync succeeded
        Synced => "synced",
        /// Repository link removed; kept for history
        Disconnected => "disconnected",
        /// Last sync failed
        Error => "error",
    }
}

wire_enum! {
    /// Kind of external entity a SyncRecord points at
    EntityType as "entity type" {
        /// Tracker issue
        Issue => "issue",
    }
}
