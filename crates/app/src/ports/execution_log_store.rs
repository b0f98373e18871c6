//! Execution log port: one entry per rule-evaluation cycle.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::{ExecutionLog, LogCompletion, LogStatus};
use adpilot_domain::id::{ExecutionLogId, RuleId};
use adpilot_domain::time::Timestamp;

pub trait ExecutionLogStore {
    /// Append a new (pending) entry.
    fn create(
        &self,
        log: ExecutionLog,
    ) -> impl Future<Output = Result<ExecutionLog, AdPilotError>> + Send;

    /// Apply the terminal update, detail payload included.
    fn finish(
        &self,
        id: ExecutionLogId,
        completion: &LogCompletion,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;

    /// Terminal update carrying only status and message.
    fn finish_minimal(
        &self,
        id: ExecutionLogId,
        status: LogStatus,
        message: Option<&str>,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;

    /// Latest entries of a rule, newest first.
    fn recent_for_rule(
        &self,
        rule_id: RuleId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, AdPilotError>> + Send;
}
