//! Action executor: applies one resolved action to the ad platform.
//!
//! Status changes read the current status first and skip when the object is
//! already there. Budget changes read the current budget, apply the
//! adjustment in whole currency units, clamp, and write back in platform
//! units. Every platform call is bounded by `call_timeout`.

use std::future::Future;
use std::time::Duration;

use adpilot_domain::account::{Budget, TargetStatus};
use adpilot_domain::budget::{BudgetLimits, compute_new_budget};
use adpilot_domain::currency::CurrencyPolicy;
use adpilot_domain::error::{AdPilotError, ExternalApiError};
use adpilot_domain::execution_log::ActionResult;
use adpilot_domain::id::{RuleId, UserId};
use adpilot_domain::revert::compute_revert_instant;
use adpilot_domain::rule::{
    Action, AdjustmentMode, AdvancedSettings, AutoRevert, BudgetAdjustment, BudgetDirection,
};
use adpilot_domain::time::Timestamp;
use chrono_tz::Tz;
use serde_json::json;

use crate::ports::{AdPlatform, PendingRevertStore};
use crate::services::revert_scheduler::{RevertScheduler, RevertTarget};

/// Platform-facing knobs shared by every execution.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub policy: CurrencyPolicy,
    pub call_timeout: Duration,
    /// Platform budget floor for the local currency, whole units.
    pub min_budget_local: f64,
    /// Platform budget floor for every other currency, whole units.
    pub min_budget_foreign: f64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            policy: CurrencyPolicy::default(),
            call_timeout: Duration::from_secs(20),
            min_budget_local: 20_000.0,
            min_budget_foreign: 1.0,
        }
    }
}

/// The object an action applies to, with everything needed to reach it.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionTarget<'a> {
    pub rule_id: RuleId,
    pub user_id: UserId,
    pub object_id: &'a str,
    pub ad_account_id: &'a str,
    pub credential: &'a str,
    pub currency: Option<&'a str>,
    pub timezone: Tz,
    pub settings: &'a AdvancedSettings,
}

/// Non-error result of an execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub result: ActionResult,
    pub reason: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl ExecutionOutcome {
    fn executed(payload: serde_json::Value) -> Self {
        Self {
            result: ActionResult::Executed,
            reason: None,
            payload: Some(payload),
        }
    }

    fn would_execute(payload: serde_json::Value) -> Self {
        Self {
            result: ActionResult::WouldExecute,
            reason: None,
            payload: Some(payload),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            result: ActionResult::Skipped,
            reason: Some(reason.into()),
            payload: None,
        }
    }
}

pub struct ActionExecutor<P, V> {
    platform: P,
    scheduler: RevertScheduler<V>,
    settings: ExecutorSettings,
}

impl<P, V> ActionExecutor<P, V>
where
    P: AdPlatform,
    V: PendingRevertStore,
{
    pub fn new(platform: P, scheduler: RevertScheduler<V>, settings: ExecutorSettings) -> Self {
        Self {
            platform,
            scheduler,
            settings,
        }
    }

    /// Apply `action` to `target`. A dry run reads but never writes.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::ExternalApi`] when the platform rejects a call,
    /// times out, or cannot be reached.
    #[tracing::instrument(skip(self, action, target), fields(object_id = target.object_id, action = %action))]
    pub async fn execute(
        &self,
        action: &Action,
        target: &ExecutionTarget<'_>,
        dry_run: bool,
        now: Timestamp,
    ) -> Result<ExecutionOutcome, AdPilotError> {
        match action {
            Action::TurnOff { auto_revert } => {
                self.change_status(target, TargetStatus::Paused, auto_revert.as_ref(), dry_run, now)
                    .await
            }
            Action::TurnOn => {
                self.change_status(target, TargetStatus::Active, None, dry_run, now)
                    .await
            }
            Action::IncreaseBudget(adjustment) => {
                self.change_budget(target, BudgetDirection::Increase, adjustment, dry_run)
                    .await
            }
            Action::DecreaseBudget(adjustment) => {
                self.change_budget(target, BudgetDirection::Decrease, adjustment, dry_run)
                    .await
            }
            Action::Keep => Ok(ExecutionOutcome::skipped("keep has no platform effect")),
        }
    }

    async fn change_status(
        &self,
        target: &ExecutionTarget<'_>,
        status: TargetStatus,
        auto_revert: Option<&AutoRevert>,
        dry_run: bool,
        now: Timestamp,
    ) -> Result<ExecutionOutcome, AdPilotError> {
        let current = self
            .bounded(self.platform.get_status(target.credential, target.object_id))
            .await?;
        if status.is_satisfied_by(&current) {
            tracing::info!(?current, "already in that state, skipping");
            return Ok(ExecutionOutcome::skipped("already in that state"));
        }

        let mut payload = json!({ "from": current, "to": status });
        if dry_run {
            if let Some(revert) = auto_revert {
                let due = compute_revert_instant(&revert.schedule, now, target.timezone);
                payload["revert_at"] = json!(due);
            }
            return Ok(ExecutionOutcome::would_execute(payload));
        }

        let response = self
            .bounded(
                self.platform
                    .set_status(target.credential, target.object_id, status),
            )
            .await?;
        payload["response"] = response;

        if let Some(revert) = auto_revert {
            let revert_target = RevertTarget {
                rule_id: target.rule_id,
                user_id: target.user_id,
                object_id: target.object_id,
                ad_account_id: target.ad_account_id,
            };
            match self
                .scheduler
                .schedule(revert_target, revert, target.timezone, now)
                .await
            {
                Ok(Some(pending)) => payload["revert_at"] = json!(pending.revert_at),
                Ok(None) => payload["revert_error"] = json!("auto-revert has no valid due time"),
                Err(err) => {
                    tracing::warn!(error = %err.detailed_message(), "failed to persist auto-revert");
                    payload["revert_error"] = json!(err.detailed_message());
                }
            }
        }
        Ok(ExecutionOutcome::executed(payload))
    }

    async fn change_budget(
        &self,
        target: &ExecutionTarget<'_>,
        direction: BudgetDirection,
        adjustment: &BudgetAdjustment,
        dry_run: bool,
    ) -> Result<ExecutionOutcome, AdPilotError> {
        let policy = &self.settings.policy;
        if let Some(pinned) = adjustment.currency.as_deref() {
            let account_currency = target.currency.unwrap_or(policy.local_currency());
            if adjustment.mode == AdjustmentMode::Absolute
                && !pinned.eq_ignore_ascii_case(account_currency)
            {
                return Ok(ExecutionOutcome::skipped(format!(
                    "adjustment is in {pinned} but the account uses {account_currency}"
                )));
            }
        }

        let Some(budget) = self
            .bounded(self.platform.get_budget(target.credential, target.object_id))
            .await?
        else {
            return Ok(ExecutionOutcome::skipped("object has no budget of its own"));
        };

        let current = policy.to_major(budget.amount, target.currency);
        let limits = BudgetLimits {
            floor: target.settings.min_budget.unwrap_or_else(|| {
                if policy.is_exempt(target.currency) {
                    self.settings.min_budget_local
                } else {
                    self.settings.min_budget_foreign
                }
            }),
            cap: target.settings.max_budget,
        };
        let new = compute_new_budget(current, direction, adjustment, limits);
        if (new - current).abs() < 0.5 {
            return Ok(ExecutionOutcome::skipped("budget unchanged after applying limits"));
        }

        let mut payload = json!({ "kind": budget.kind, "from": current, "to": new });
        if dry_run {
            return Ok(ExecutionOutcome::would_execute(payload));
        }

        let amount = policy.to_platform(new, target.currency).round();
        let response = self
            .bounded(self.platform.set_budget(
                target.credential,
                target.object_id,
                Budget {
                    amount,
                    kind: budget.kind,
                },
            ))
            .await?;
        payload["response"] = response;
        Ok(ExecutionOutcome::executed(payload))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, AdPilotError>>,
    ) -> Result<T, AdPilotError> {
        let limit = self.settings.call_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ExternalApiError::Timeout {
                after_secs: limit.as_secs(),
            })?
    }
}
