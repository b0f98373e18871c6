//! `SQLite` implementation of [`AdAccountStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::AdAccountStore;
use adpilot_domain::account::AdAccount;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::UserId;

use crate::error::StorageError;

struct Wrapper(AdAccount);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let user_id: uuid::Uuid = row.try_get("user_id")?;
        Ok(Self(AdAccount {
            id: row.try_get("id")?,
            user_id: UserId::from_uuid(user_id),
            name: row.try_get("name")?,
            currency: row.try_get("currency")?,
            timezone: row.try_get("timezone")?,
            access_token: row.try_get("access_token")?,
            active: row.try_get("active")?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO ad_accounts (id, user_id, name, currency, timezone, access_token, active)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        user_id = excluded.user_id,
        name = excluded.name,
        currency = excluded.currency,
        timezone = excluded.timezone,
        access_token = excluded.access_token,
        active = excluded.active
";

/// `SQLite`-backed ad account store.
#[derive(Clone)]
pub struct SqliteAdAccountStore {
    pool: SqlitePool,
}

impl SqliteAdAccountStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the account, or replace the stored one with the same id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn upsert(&self, account: &AdAccount) -> Result<(), AdPilotError> {
        sqlx::query(UPSERT)
            .bind(&account.id)
            .bind(account.user_id.as_uuid())
            .bind(&account.name)
            .bind(&account.currency)
            .bind(&account.timezone)
            .bind(&account.access_token)
            .bind(account.active)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl AdAccountStore for SqliteAdAccountStore {
    async fn active_for_user(&self, user_id: UserId) -> Result<Vec<AdAccount>, AdPilotError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM ad_accounts WHERE user_id = ? AND active = 1 ORDER BY id")
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get_by_id(&self, account_id: &str) -> Result<Option<AdAccount>, AdPilotError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM ad_accounts WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}
