//! `SQLite` implementation of [`MetricsStore`] over ingested daily records.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use adpilot_app::ports::{MetricsQuery, MetricsStore};
use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::UserId;
use adpilot_domain::metrics::RawPerformanceRecord;
use adpilot_domain::rule::Scope;

use crate::codec::{decode_date, decode_error, encode_date};
use crate::error::StorageError;

struct Wrapper(RawPerformanceRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let level: String = row.try_get("level")?;
        let date: String = row.try_get("date")?;
        Ok(Self(RawPerformanceRecord {
            level: Scope::from_str(&level).map_err(decode_error)?,
            ad_account_id: row.try_get("ad_account_id")?,
            date: decode_date(&date)?,
            campaign_id: row.try_get("campaign_id")?,
            campaign_name: row.try_get("campaign_name")?,
            ad_group_id: row.try_get("ad_group_id")?,
            ad_group_name: row.try_get("ad_group_name")?,
            ad_id: row.try_get("ad_id")?,
            ad_name: row.try_get("ad_name")?,
            spend: row.try_get("spend")?,
            impressions: row.try_get("impressions")?,
            clicks: row.try_get("clicks")?,
            results: row.try_get("results")?,
        }))
    }
}

fn id_column(level: Scope) -> &'static str {
    match level {
        Scope::Campaign => "campaign_id",
        Scope::AdGroup => "ad_group_id",
        Scope::Ad => "ad_id",
    }
}

const INSERT: &str = r"
    INSERT INTO performance_records (
        user_id, level, ad_account_id, date,
        campaign_id, campaign_name, ad_group_id, ad_group_name, ad_id, ad_name,
        spend, impressions, clicks, results
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

/// `SQLite`-backed store of raw daily performance records.
#[derive(Clone)]
pub struct SqliteMetricsStore {
    pool: SqlitePool,
}

impl SqliteMetricsStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one ingested record for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn insert(
        &self,
        user_id: UserId,
        record: &RawPerformanceRecord,
    ) -> Result<(), AdPilotError> {
        sqlx::query(INSERT)
            .bind(user_id.as_uuid())
            .bind(record.level.as_str())
            .bind(&record.ad_account_id)
            .bind(encode_date(record.date))
            .bind(&record.campaign_id)
            .bind(&record.campaign_name)
            .bind(&record.ad_group_id)
            .bind(&record.ad_group_name)
            .bind(&record.ad_id)
            .bind(&record.ad_name)
            .bind(record.spend)
            .bind(record.impressions)
            .bind(record.clicks)
            .bind(record.results)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl MetricsStore for SqliteMetricsStore {
    async fn fetch(&self, query: &MetricsQuery) -> Result<Vec<RawPerformanceRecord>, AdPilotError> {
        let mut sql: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM performance_records WHERE user_id = ");
        sql.push_bind(query.user_id.as_uuid())
            .push(" AND ad_account_id = ")
            .push_bind(query.ad_account_id.clone())
            .push(" AND level = ")
            .push_bind(query.level.as_str())
            .push(" AND date >= ")
            .push_bind(encode_date(query.window.since))
            .push(" AND date <= ")
            .push_bind(encode_date(query.window.until));

        if let Some(filter) = &query.filter {
            if filter.ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push(" AND ").push(id_column(filter.level)).push(" IN (");
            let mut ids = sql.separated(", ");
            for id in &filter.ids {
                ids.push_bind(id.clone());
            }
            ids.push_unseparated(")");
        }
        sql.push(" ORDER BY date, id");

        let rows: Vec<Wrapper> = sql
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
