//! `SQLite` implementation of [`ActionHistoryStore`].

use sqlx::SqlitePool;

use adpilot_app::ports::ActionHistoryStore;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::ActionExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::ActionKind;
use adpilot_domain::time::Timestamp;

use crate::codec::encode_ts;
use crate::error::StorageError;

const INSERT: &str = r"
    INSERT INTO action_executions (rule_id, object_id, action, executed_at)
    VALUES (?, ?, ?, ?)
";

const COUNT_SINCE: &str = r"
    SELECT COUNT(*) FROM action_executions
    WHERE rule_id = ? AND object_id = ? AND action = ? AND executed_at >= ?
";

/// `SQLite`-backed history of executed actions.
#[derive(Clone)]
pub struct SqliteActionHistoryStore {
    pool: SqlitePool,
}

impl SqliteActionHistoryStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ActionHistoryStore for SqliteActionHistoryStore {
    async fn record(&self, execution: ActionExecution) -> Result<(), AdPilotError> {
        sqlx::query(INSERT)
            .bind(execution.rule_id.as_uuid())
            .bind(&execution.object_id)
            .bind(execution.action.as_str())
            .bind(encode_ts(execution.executed_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn count_since(
        &self,
        rule_id: RuleId,
        object_id: &str,
        action: ActionKind,
        since: Timestamp,
    ) -> Result<u32, AdPilotError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_SINCE)
            .bind(rule_id.as_uuid())
            .bind(object_id)
            .bind(action.as_str())
            .bind(encode_ts(since))
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
