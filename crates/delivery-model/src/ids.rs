//! Strongly-typed record identifiers
//!
//! Every persisted record is keyed by a UUID. Each record kind gets its own
//! newtype so a `SignoffId` can never be passed where an `ArtifactId` is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Underlying UUID
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// Project identifier
    ProjectId
);
record_id!(
    /// Artifact identifier
    ArtifactId
);
record_id!(
    /// Signoff identifier
    SignoffId
);
record_id!(
    /// Ticket identifier
    TicketId
);
record_id!(
    /// SyncRecord identifier
    SyncRecordId
);
record_id!(
    /// User identifier, as supplied by the authentication layer
    UserId
);
