//! Revert scheduler: turns an auto-revert setting into a persisted
//! pending revert. It never waits or fires anything itself.

use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::{RuleId, UserId};
use adpilot_domain::revert::{PendingRevert, compute_revert_instant};
use adpilot_domain::rule::AutoRevert;
use adpilot_domain::time::Timestamp;
use chrono_tz::Tz;

use crate::ports::PendingRevertStore;

/// Identifies the paused object a revert belongs to.
#[derive(Debug, Clone, Copy)]
pub struct RevertTarget<'a> {
    pub rule_id: RuleId,
    pub user_id: UserId,
    pub object_id: &'a str,
    pub ad_account_id: &'a str,
}

pub struct RevertScheduler<V> {
    reverts: V,
}

impl<V: PendingRevertStore> RevertScheduler<V> {
    pub fn new(reverts: V) -> Self {
        Self { reverts }
    }

    /// Persist a pending revert for `target`.
    ///
    /// Returns `Ok(None)` when the schedule yields no usable instant.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the pending-revert store.
    #[tracing::instrument(skip(self, auto_revert), fields(object_id = target.object_id))]
    pub async fn schedule(
        &self,
        target: RevertTarget<'_>,
        auto_revert: &AutoRevert,
        timezone: Tz,
        now: Timestamp,
    ) -> Result<Option<PendingRevert>, AdPilotError> {
        let Some(revert_at) = compute_revert_instant(&auto_revert.schedule, now, timezone) else {
            tracing::warn!(schedule = %auto_revert.schedule, "auto-revert has no valid due time");
            return Ok(None);
        };
        let revert = PendingRevert::new(
            target.rule_id,
            target.user_id,
            target.object_id,
            target.ad_account_id,
            auto_revert.revert_action,
            revert_at,
            now,
        );
        let created = self.reverts.create(revert).await?;
        tracing::info!(%revert_at, action = ?created.action, "auto-revert scheduled");
        Ok(Some(created))
    }
}
