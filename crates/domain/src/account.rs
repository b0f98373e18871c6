//! Ad account: the platform-side owner of campaigns, with its currency,
//! reporting timezone and access credential.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// An ad account connected by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdAccount {
    /// Platform identifier, e.g. `act_123`.
    pub id: String,
    pub user_id: UserId,
    pub name: String,
    /// ISO 4217 code; `None` when the platform did not report one.
    pub currency: Option<String>,
    /// IANA timezone name; `None` falls back to the engine timezone.
    pub timezone: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub active: bool,
}

impl AdAccount {
    /// Access token, when one is stored and not blank.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Delivery status of a campaign, ad group or ad as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    Active,
    Paused,
    Archived,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    /// Paused, archived or deleted objects do not deliver.
    #[must_use]
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Paused | Self::Archived | Self::Deleted)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Status the engine can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetStatus {
    Active,
    Paused,
}

impl TargetStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
        }
    }

    /// `true` when `current` already satisfies this target.
    #[must_use]
    pub fn is_satisfied_by(self, current: &RemoteStatus) -> bool {
        match self {
            Self::Active => current.is_active(),
            Self::Paused => current.is_inactive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    Daily,
    Lifetime,
}

/// A budget as read from the platform, in platform units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub amount: f64,
    pub kind: BudgetKind,
}
