//! `SQLite` implementation of [`SalesStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::SalesStore;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::metrics::SalesRecord;
use adpilot_domain::rule::Scope;

use crate::codec::{decode_date, encode_date};
use crate::error::StorageError;

struct Wrapper(SalesRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let recorded_on: String = row.try_get("recorded_on")?;
        let appointment_on: Option<String> = row.try_get("appointment_on")?;
        Ok(Self(SalesRecord {
            object_id: row.try_get("object_id")?,
            phone: row.try_get("phone")?,
            status: row.try_get("status")?,
            revenue: row.try_get("revenue")?,
            service_revenue: row.try_get("service_revenue")?,
            recorded_on: decode_date(&recorded_on)?,
            appointment_on: appointment_on.as_deref().map(decode_date).transpose()?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO sales_records (
        object_id, level, phone, status, revenue, service_revenue, recorded_on, appointment_on
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

/// `SQLite`-backed store of CRM sales records.
#[derive(Clone)]
pub struct SqliteSalesStore {
    pool: SqlitePool,
}

impl SqliteSalesStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one record attributed to an object at `level`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn insert(&self, level: Scope, record: &SalesRecord) -> Result<(), AdPilotError> {
        sqlx::query(INSERT)
            .bind(&record.object_id)
            .bind(level.as_str())
            .bind(&record.phone)
            .bind(&record.status)
            .bind(record.revenue)
            .bind(record.service_revenue)
            .bind(encode_date(record.recorded_on))
            .bind(record.appointment_on.map(encode_date))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl SalesStore for SqliteSalesStore {
    async fn find_by_object(
        &self,
        object_id: &str,
        level: Scope,
    ) -> Result<Vec<SalesRecord>, AdPilotError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM sales_records WHERE object_id = ? AND level = ? ORDER BY recorded_on, id",
        )
        .bind(object_id)
        .bind(level.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteSalesStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteSalesStore::new(db.pool().clone())
    }

    fn sale(object_id: &str, appointment_on: Option<NaiveDate>) -> SalesRecord {
        SalesRecord {
            object_id: object_id.to_string(),
            phone: Some("0900000000".to_string()),
            status: "Booked".to_string(),
            revenue: 1_500_000.0,
            service_revenue: 1_000_000.0,
            recorded_on: NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
            appointment_on,
        }
    }

    #[tokio::test]
    async fn should_find_records_by_object_and_level() {
        let store = setup().await;
        let appointment = NaiveDate::from_ymd_opt(2024, 5, 12);
        store.insert(Scope::Campaign, &sale("c1", appointment)).await.unwrap();
        store.insert(Scope::AdGroup, &sale("c1", None)).await.unwrap();
        store.insert(Scope::Campaign, &sale("c2", None)).await.unwrap();

        let found = store.find_by_object("c1", Scope::Campaign).await.unwrap();

        assert_eq!(found, vec![sale("c1", appointment)]);
    }
}
