//! `SQLite` implementation of [`ExecutionLogStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::ExecutionLogStore;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::{ExecutionLog, LogCompletion, LogStatus};
use adpilot_domain::id::{ExecutionLogId, RuleId};
use adpilot_domain::time::Timestamp;

use crate::codec::{decode_error, decode_opt_ts, decode_ts, encode_ts, lenient_json};
use crate::error::StorageError;

struct Wrapper(ExecutionLog);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let rule_id: uuid::Uuid = row.try_get("rule_id")?;
        let started_at: String = row.try_get("started_at")?;
        let finished_at: Option<String> = row.try_get("finished_at")?;
        let status: String = row.try_get("status")?;
        let matched_count: i64 = row.try_get("matched_count")?;
        let executed_count: i64 = row.try_get("executed_count")?;
        let details: String = row.try_get("details")?;

        Ok(Self(ExecutionLog {
            id: ExecutionLogId::from_uuid(id),
            rule_id: RuleId::from_uuid(rule_id),
            started_at: decode_ts(&started_at)?,
            finished_at: decode_opt_ts(finished_at)?,
            status: LogStatus::from_str(&status).map_err(decode_error)?,
            dry_run: row.try_get("dry_run")?,
            matched_count: u32::try_from(matched_count).map_err(decode_error)?,
            executed_count: u32::try_from(executed_count).map_err(decode_error)?,
            details: lenient_json("execution_logs", "details", &details),
            message: row.try_get("message")?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO execution_logs (
        id, rule_id, started_at, finished_at, status, dry_run,
        matched_count, executed_count, details, message
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const FINISH: &str = r"
    UPDATE execution_logs
    SET status = ?, finished_at = ?, matched_count = ?, executed_count = ?, details = ?, message = ?
    WHERE id = ?
";

const FINISH_MINIMAL: &str = r"
    UPDATE execution_logs SET status = ?, finished_at = ?, message = ? WHERE id = ?
";

const SELECT_RECENT: &str = r"
    SELECT * FROM execution_logs
    WHERE rule_id = ?
    ORDER BY started_at DESC
    LIMIT ?
";

/// `SQLite`-backed execution log.
#[derive(Clone)]
pub struct SqliteExecutionLogStore {
    pool: SqlitePool,
}

impl SqliteExecutionLogStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ExecutionLogStore for SqliteExecutionLogStore {
    async fn create(&self, log: ExecutionLog) -> Result<ExecutionLog, AdPilotError> {
        let details = serde_json::to_string(&log.details).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(log.id.as_uuid())
            .bind(log.rule_id.as_uuid())
            .bind(encode_ts(log.started_at))
            .bind(log.finished_at.map(encode_ts))
            .bind(log.status.as_str())
            .bind(log.dry_run)
            .bind(i64::from(log.matched_count))
            .bind(i64::from(log.executed_count))
            .bind(&details)
            .bind(&log.message)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(log)
    }

    async fn finish(
        &self,
        id: ExecutionLogId,
        completion: &LogCompletion,
    ) -> Result<(), AdPilotError> {
        let details = serde_json::to_string(&completion.details).map_err(StorageError::from)?;

        sqlx::query(FINISH)
            .bind(completion.status.as_str())
            .bind(encode_ts(completion.finished_at))
            .bind(i64::from(completion.matched_count))
            .bind(i64::from(completion.executed_count))
            .bind(&details)
            .bind(&completion.message)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn finish_minimal(
        &self,
        id: ExecutionLogId,
        status: LogStatus,
        message: Option<&str>,
        at: Timestamp,
    ) -> Result<(), AdPilotError> {
        sqlx::query(FINISH_MINIMAL)
            .bind(status.as_str())
            .bind(encode_ts(at))
            .bind(message)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn recent_for_rule(
        &self,
        rule_id: RuleId,
        limit: u32,
    ) -> Result<Vec<ExecutionLog>, AdPilotError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(rule_id.as_uuid())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
