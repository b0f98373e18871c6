//! Action history port: successful mutating actions, counted by the
//! cooldown guard.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::ActionExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::ActionKind;
use adpilot_domain::time::Timestamp;

pub trait ActionHistoryStore {
    fn record(
        &self,
        execution: ActionExecution,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;

    /// Executions of `(rule_id, object_id, action)` at or after `since`.
    fn count_since(
        &self,
        rule_id: RuleId,
        object_id: &str,
        action: ActionKind,
        since: Timestamp,
    ) -> impl Future<Output = Result<u32, AdPilotError>> + Send;
}
