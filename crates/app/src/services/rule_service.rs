//! Rule service: use-cases for storing rules and reading their run history.

use adpilot_domain::error::{AdPilotError, NotFoundError};
use adpilot_domain::execution_log::ExecutionLog;
use adpilot_domain::id::{RuleId, UserId};
use adpilot_domain::rule::Rule;

use crate::ports::{ExecutionLogStore, RuleRepository};

/// Number of log entries returned when the caller does not ask for a count.
pub const DEFAULT_LOG_LIMIT: u32 = 20;
/// Upper bound on log entries returned in one call.
pub const MAX_LOG_LIMIT: u32 = 100;

pub struct RuleService<R, E> {
    rules: R,
    logs: E,
}

impl<R: RuleRepository, E: ExecutionLogStore> RuleService<R, E> {
    pub fn new(rules: R, logs: E) -> Self {
        Self { rules, logs }
    }

    /// Store a new rule after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule, AdPilotError> {
        rule.validate()?;
        self.rules.create(rule).await
    }

    /// Look up a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`] when no rule with `id` exists, or
    /// a storage error from the repository.
    pub async fn get_rule(&self, id: RuleId) -> Result<Rule, AdPilotError> {
        self.rules.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    /// Look up a rule owned by `user_id`. Another user's rule reads as missing.
    ///
    /// # Errors
    ///
    /// Same as [`RuleService::get_rule`].
    pub async fn get_owned_rule(&self, id: RuleId, user_id: UserId) -> Result<Rule, AdPilotError> {
        let rule = self.get_rule(id).await?;
        if rule.user_id == user_id {
            Ok(rule)
        } else {
            Err(not_found(id))
        }
    }

    /// Most recent log entries of a rule, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_LOG_LIMIT`] and is clamped to
    /// `1..=MAX_LOG_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`] when the rule does not exist, or a
    /// storage error.
    pub async fn recent_logs(
        &self,
        rule_id: RuleId,
        limit: Option<u32>,
    ) -> Result<Vec<ExecutionLog>, AdPilotError> {
        self.get_rule(rule_id).await?;
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        self.logs.recent_for_rule(rule_id, limit).await
    }
}

fn not_found(id: RuleId) -> AdPilotError {
    NotFoundError {
        entity: "Rule",
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use adpilot_domain::error::ValidationError;
    use adpilot_domain::rule::Action;
    use chrono::Duration;

    use super::*;
    use crate::testing::{InMemoryLogs, InMemoryRuleRepo};

    fn rule(user_id: UserId) -> Rule {
        Rule::builder()
            .user_id(user_id)
            .name("Pause")
            .action(Action::TurnOff { auto_revert: None })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_reject_rule_when_it_has_no_action() {
        let service = RuleService::new(InMemoryRuleRepo::default(), InMemoryLogs::default());
        let mut invalid = rule(UserId::new());
        invalid.actions.clear();

        let err = service.create_rule(invalid).await.unwrap_err();

        assert!(matches!(
            err,
            AdPilotError::Validation(ValidationError::NoActions)
        ));
    }

    #[tokio::test]
    async fn should_hide_rule_when_owned_by_another_user() {
        let repo = InMemoryRuleRepo::default();
        let service = RuleService::new(repo, InMemoryLogs::default());
        let stored = service.create_rule(rule(UserId::new())).await.unwrap();

        let err = service
            .get_owned_rule(stored.id, UserId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AdPilotError::NotFound(_)));
        assert_eq!(
            service.get_owned_rule(stored.id, stored.user_id).await.unwrap().id,
            stored.id
        );
    }

    #[tokio::test]
    async fn should_return_newest_logs_first_when_limited() {
        let logs = InMemoryLogs::default();
        let service = RuleService::new(InMemoryRuleRepo::default(), logs.clone());
        let stored = service.create_rule(rule(UserId::new())).await.unwrap();
        let start = adpilot_domain::time::now();
        for minutes in 0..3 {
            let log = ExecutionLog::pending(stored.id, false, start + Duration::minutes(minutes));
            logs.store.lock().unwrap().insert(log.id, log);
        }

        let recent = service.recent_logs(stored.id, Some(2)).await.unwrap();

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].started_at, start + Duration::minutes(2));
    }

    #[tokio::test]
    async fn should_return_not_found_when_listing_logs_of_unknown_rule() {
        let service = RuleService::new(InMemoryRuleRepo::default(), InMemoryLogs::default());

        let err = service.recent_logs(RuleId::new(), None).await.unwrap_err();

        assert!(matches!(err, AdPilotError::NotFound(_)));
    }
}
