//! Typed identifier newtypes backed by UUIDs.
//!
//! Identifiers minted by the external ad platform (campaigns, ad groups, ads,
//! ad accounts) are opaque strings and are not modelled here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Rule`](crate::rule::Rule).
    RuleId
);

define_id!(
    /// Unique identifier for a [`Step`](crate::rule::Step).
    StepId
);

define_id!(
    /// Unique identifier for the user owning rules, labels and ad accounts.
    UserId
);

define_id!(
    /// Unique identifier for a label (tag) assigned to platform objects.
    LabelId
);

define_id!(
    /// Unique identifier for an [`ExecutionLog`](crate::execution_log::ExecutionLog) entry.
    ExecutionLogId
);

define_id!(
    /// Unique identifier for a [`PendingRevert`](crate::revert::PendingRevert).
    PendingRevertId
);
