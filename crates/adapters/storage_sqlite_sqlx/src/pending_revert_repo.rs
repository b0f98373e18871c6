//! `SQLite` implementation of [`PendingRevertStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::PendingRevertStore;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::{PendingRevertId, RuleId, UserId};
use adpilot_domain::revert::{PendingRevert, RevertStatus};
use adpilot_domain::rule::{ActionKind, RevertAction};
use adpilot_domain::time::Timestamp;

use crate::codec::{decode_error, decode_ts, encode_ts};
use crate::error::StorageError;

fn decode_action(raw: &str) -> Result<RevertAction, sqlx::Error> {
    match ActionKind::from_str(raw).map_err(decode_error)? {
        ActionKind::TurnOn => Ok(RevertAction::TurnOn),
        ActionKind::TurnOff => Ok(RevertAction::TurnOff),
        other => Err(decode_error(format!("{other} cannot be replayed as a revert"))),
    }
}

struct Wrapper(PendingRevert);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let rule_id: uuid::Uuid = row.try_get("rule_id")?;
        let user_id: uuid::Uuid = row.try_get("user_id")?;
        let action: String = row.try_get("action")?;
        let revert_at: String = row.try_get("revert_at")?;
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(PendingRevert {
            id: PendingRevertId::from_uuid(id),
            rule_id: RuleId::from_uuid(rule_id),
            user_id: UserId::from_uuid(user_id),
            object_id: row.try_get("object_id")?,
            ad_account_id: row.try_get("ad_account_id")?,
            action: decode_action(&action)?,
            revert_at: decode_ts(&revert_at)?,
            status: RevertStatus::from_str(&status).map_err(decode_error)?,
            error: row.try_get("error")?,
            created_at: decode_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO pending_reverts (
        id, rule_id, user_id, object_id, ad_account_id, action, revert_at, status, error, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_DUE: &str = r"
    SELECT * FROM pending_reverts
    WHERE status = 'pending' AND revert_at <= ?
    ORDER BY revert_at ASC
    LIMIT ?
";

const MARK: &str = r"
    UPDATE pending_reverts SET status = ?, error = ?, finished_at = ? WHERE id = ?
";

/// `SQLite`-backed queue of scheduled reverts.
#[derive(Clone)]
pub struct SqlitePendingRevertStore {
    pool: SqlitePool,
}

impl SqlitePendingRevertStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn mark(
        &self,
        id: PendingRevertId,
        status: RevertStatus,
        error: Option<&str>,
        at: Timestamp,
    ) -> Result<(), AdPilotError> {
        sqlx::query(MARK)
            .bind(status.as_str())
            .bind(error)
            .bind(encode_ts(at))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl PendingRevertStore for SqlitePendingRevertStore {
    async fn create(&self, revert: PendingRevert) -> Result<PendingRevert, AdPilotError> {
        sqlx::query(INSERT)
            .bind(revert.id.as_uuid())
            .bind(revert.rule_id.as_uuid())
            .bind(revert.user_id.as_uuid())
            .bind(&revert.object_id)
            .bind(&revert.ad_account_id)
            .bind(revert.action.kind().as_str())
            .bind(encode_ts(revert.revert_at))
            .bind(revert.status.as_str())
            .bind(&revert.error)
            .bind(encode_ts(revert.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(revert)
    }

    async fn due(&self, now: Timestamp, limit: u32) -> Result<Vec<PendingRevert>, AdPilotError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_DUE)
            .bind(encode_ts(now))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn mark_done(&self, id: PendingRevertId, at: Timestamp) -> Result<(), AdPilotError> {
        self.mark(id, RevertStatus::Done, None, at).await
    }

    async fn mark_failed(
        &self,
        id: PendingRevertId,
        error: &str,
        at: Timestamp,
    ) -> Result<(), AdPilotError> {
        self.mark(id, RevertStatus::Failed, Some(error), at).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};

    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqlitePendingRevertStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqlitePendingRevertStore::new(db.pool().clone())
    }

    fn now() -> Timestamp {
        DateTime::parse_from_rfc3339("2024-05-10T05:00:00Z").unwrap().to_utc()
    }

    fn revert(revert_at: Timestamp) -> PendingRevert {
        PendingRevert::new(
            RuleId::new(),
            UserId::new(),
            "c1",
            "act_1",
            RevertAction::TurnOn,
            revert_at,
            now() - Duration::hours(3),
        )
    }

    #[tokio::test]
    async fn should_return_only_due_pending_rows_oldest_first() {
        let store = setup().await;
        let late = store.create(revert(now() - Duration::minutes(1))).await.unwrap();
        let early = store.create(revert(now() - Duration::hours(1))).await.unwrap();
        store.create(revert(now() + Duration::minutes(1))).await.unwrap();
        let done = store.create(revert(now() - Duration::hours(2))).await.unwrap();
        store.mark_done(done.id, now()).await.unwrap();

        let due = store.due(now(), 10).await.unwrap();

        let ids: Vec<PendingRevertId> = due.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(due[1], late);
    }

    #[tokio::test]
    async fn should_keep_error_message_when_marked_failed() {
        let store = setup().await;
        let row = store.create(revert(now())).await.unwrap();

        store.mark_failed(row.id, "token expired", now()).await.unwrap();

        assert!(store.due(now(), 10).await.unwrap().is_empty());
        let (status, error): (String, Option<String>) =
            sqlx::query_as("SELECT status, error FROM pending_reverts WHERE id = ?")
                .bind(row.id.as_uuid())
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(status, "failed");
        assert_eq!(error.as_deref(), Some("token expired"));
    }
}
