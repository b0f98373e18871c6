//! Revert sweeper: consumes due pending reverts.
//!
//! Runs as an independent periodic task: reads `pending` rows whose due
//! instant has passed, replays the stored revert action through the same
//! [`ActionExecutor`] the engine uses, and marks each row `done` or `failed`.

use adpilot_domain::error::{AdPilotError, ConfigurationError};
use adpilot_domain::revert::PendingRevert;
use adpilot_domain::rule::AdvancedSettings;
use adpilot_domain::time::{Timestamp, parse_timezone};
use chrono_tz::Tz;

use crate::ports::{AdAccountStore, AdPlatform, PendingRevertStore};
use crate::services::action_executor::{ActionExecutor, ExecutionTarget};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub done: u32,
    pub failed: u32,
}

pub struct RevertSweeper<V, A, P> {
    reverts: V,
    accounts: A,
    executor: ActionExecutor<P, V>,
    default_timezone: Tz,
    batch_size: u32,
}

impl<V, A, P> RevertSweeper<V, A, P>
where
    V: PendingRevertStore,
    A: AdAccountStore,
    P: AdPlatform,
{
    pub fn new(
        reverts: V,
        accounts: A,
        executor: ActionExecutor<P, V>,
        default_timezone: Tz,
        batch_size: u32,
    ) -> Self {
        Self {
            reverts,
            accounts,
            executor,
            default_timezone,
            batch_size,
        }
    }

    /// Process every revert due at `now`, up to one batch.
    ///
    /// # Errors
    ///
    /// Returns a storage error when due rows cannot be listed or a row's
    /// terminal status cannot be written.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: Timestamp) -> Result<SweepReport, AdPilotError> {
        let due = self.reverts.due(now, self.batch_size).await?;
        let mut report = SweepReport::default();
        for revert in due {
            match self.apply(&revert, now).await {
                Ok(()) => {
                    self.reverts.mark_done(revert.id, now).await?;
                    report.done += 1;
                }
                Err(err) => {
                    let message = err.detailed_message();
                    tracing::warn!(
                        revert_id = %revert.id,
                        object_id = %revert.object_id,
                        error = %message,
                        "auto-revert failed"
                    );
                    self.reverts.mark_failed(revert.id, &message, now).await?;
                    report.failed += 1;
                }
            }
        }
        if report.done + report.failed > 0 {
            tracing::info!(done = report.done, failed = report.failed, "revert sweep finished");
        }
        Ok(report)
    }

    async fn apply(&self, revert: &PendingRevert, now: Timestamp) -> Result<(), AdPilotError> {
        let account = self
            .accounts
            .get_by_id(&revert.ad_account_id)
            .await?
            .ok_or_else(|| ConfigurationError::MissingCredential {
                account_id: revert.ad_account_id.clone(),
            })?;
        let credential = account
            .credential()
            .ok_or_else(|| ConfigurationError::MissingCredential {
                account_id: account.id.clone(),
            })?;
        let timezone = account
            .timezone
            .as_deref()
            .and_then(|name| parse_timezone(name).ok())
            .unwrap_or(self.default_timezone);
        let settings = AdvancedSettings::default();
        let target = ExecutionTarget {
            rule_id: revert.rule_id,
            user_id: revert.user_id,
            object_id: &revert.object_id,
            ad_account_id: &revert.ad_account_id,
            credential,
            currency: account.currency.as_deref(),
            timezone,
            settings: &settings,
        };
        let outcome = self
            .executor
            .execute(&revert.action.into_action(), &target, false, now)
            .await?;
        tracing::info!(
            object_id = %revert.object_id,
            result = ?outcome.result,
            reason = outcome.reason.as_deref().unwrap_or(""),
            "auto-revert applied"
        );
        Ok(())
    }
}
