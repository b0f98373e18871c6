//! Deferred reverts: when an auto-reverting `turn_off` is undone, and the
//! persisted record a sweeper later consumes.

use chrono::{Duration, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::id::{PendingRevertId, RuleId, UserId};
use crate::rule::{RevertAction, RevertSchedule};
use crate::time::{Timestamp, localize};

/// Absolute instant at which `schedule` becomes due, seen from `now`.
///
/// Fixed times are wall-clock times in `tz`: today if still ahead, otherwise
/// tomorrow. Durations are added to `now`. Returns `None` for a non-positive
/// or unrepresentable duration.
#[must_use]
pub fn compute_revert_instant(schedule: &RevertSchedule, now: Timestamp, tz: Tz) -> Option<Timestamp> {
    match schedule {
        RevertSchedule::AtTime { at } => {
            let local_now = now.with_timezone(&tz);
            let today = local_now.date_naive();
            let candidate = localize(tz, today.and_time(at.as_naive_time()))?;
            if candidate > local_now {
                return Some(candidate.with_timezone(&Utc));
            }
            let tomorrow = today.succ_opt()?;
            localize(tz, tomorrow.and_time(at.as_naive_time())).map(|dt| dt.with_timezone(&Utc))
        }
        RevertSchedule::AfterHours { hours } => {
            if !hours.is_finite() || *hours <= 0.0 {
                return None;
            }
            let millis = hours_to_millis(*hours)?;
            now.checked_add_signed(Duration::try_milliseconds(millis)?)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn hours_to_millis(hours: f64) -> Option<i64> {
    let millis = (hours * 3_600_000.0).round();
    (millis <= TimeDelta::MAX.num_milliseconds() as f64).then_some(millis as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertStatus {
    Pending,
    Done,
    Failed,
}

impl RevertStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RevertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown revert status {other:?}")),
        }
    }
}

/// A scheduled reactivation waiting for the sweeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRevert {
    pub id: PendingRevertId,
    pub rule_id: RuleId,
    pub user_id: UserId,
    pub object_id: String,
    pub ad_account_id: String,
    pub action: RevertAction,
    pub revert_at: Timestamp,
    pub status: RevertStatus,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl PendingRevert {
    #[must_use]
    pub fn new(
        rule_id: RuleId,
        user_id: UserId,
        object_id: impl Into<String>,
        ad_account_id: impl Into<String>,
        action: RevertAction,
        revert_at: Timestamp,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: PendingRevertId::new(),
            rule_id,
            user_id,
            object_id: object_id.into(),
            ad_account_id: ad_account_id.into(),
            action,
            revert_at,
            status: RevertStatus::Pending,
            error: None,
            created_at,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == RevertStatus::Pending && self.revert_at <= now
    }
}
