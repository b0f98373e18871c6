//! Cooldown guard: may this rule fire this action on this object again?

use adpilot_domain::cooldown::{self, CooldownDecision};
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::ActionExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::{ActionKind, AdvancedSettings};
use adpilot_domain::time::Timestamp;
use chrono_tz::Tz;

use crate::ports::ActionHistoryStore;

/// Execution-limit check backed by the persisted action history.
pub struct CooldownGuard<H> {
    history: H,
}

impl<H: ActionHistoryStore> CooldownGuard<H> {
    pub fn new(history: H) -> Self {
        Self { history }
    }

    /// Decide whether `(rule_id, object_id, action)` may execute at `now`.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the history cannot be read.
    pub async fn can_execute(
        &self,
        rule_id: RuleId,
        object_id: &str,
        action: ActionKind,
        settings: &AdvancedSettings,
        timezone: Tz,
        now: Timestamp,
    ) -> Result<CooldownDecision, AdPilotError> {
        if !settings.enable_execution_limit {
            return Ok(CooldownDecision::allow());
        }
        let since = cooldown::window_start(settings, now, timezone);
        let prior = self
            .history
            .count_since(rule_id, object_id, action, since)
            .await?;
        Ok(cooldown::decide(prior, settings))
    }

    /// Record a successful execution so later checks see it.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the history store.
    pub async fn record(&self, execution: ActionExecution) -> Result<(), AdPilotError> {
        self.history.record(execution).await
    }
}
