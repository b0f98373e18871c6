//! `SQLite` implementation of [`LabelStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use adpilot_app::ports::LabelStore;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::{LabelId, UserId};
use adpilot_domain::label::LabelAssignment;
use adpilot_domain::rule::Scope;

use crate::codec::decode_error;
use crate::error::StorageError;

struct Wrapper(LabelAssignment);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let label_id: uuid::Uuid = row.try_get("label_id")?;
        let level: String = row.try_get("level")?;
        Ok(Self(LabelAssignment {
            label_id: LabelId::from_uuid(label_id),
            level: Scope::from_str(&level).map_err(decode_error)?,
            object_id: row.try_get("object_id")?,
        }))
    }
}

/// `SQLite`-backed label assignment store.
#[derive(Clone)]
pub struct SqliteLabelStore {
    pool: SqlitePool,
}

impl SqliteLabelStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attach a label to an object on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn assign(
        &self,
        user_id: UserId,
        assignment: &LabelAssignment,
    ) -> Result<(), AdPilotError> {
        sqlx::query(
            "INSERT OR IGNORE INTO label_assignments (label_id, user_id, level, object_id) VALUES (?, ?, ?, ?)",
        )
        .bind(assignment.label_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(assignment.level.as_str())
        .bind(&assignment.object_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}

impl LabelStore for SqliteLabelStore {
    async fn assignments(
        &self,
        user_id: UserId,
        labels: &[LabelId],
    ) -> Result<Vec<LabelAssignment>, AdPilotError> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM label_assignments WHERE user_id = ");
        query.push_bind(user_id.as_uuid()).push(" AND label_id IN (");
        let mut ids = query.separated(", ");
        for label in labels {
            ids.push_bind(label.as_uuid());
        }
        ids.push_unseparated(") ORDER BY level, object_id");

        let rows: Vec<Wrapper> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
