//! `SQLite` implementation of [`RuleRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::{RuleRef, RuleRepository};
use adpilot_domain::error::{AdPilotError, ConfigurationError};
use adpilot_domain::execution_log::LogStatus;
use adpilot_domain::id::{RuleId, UserId};
use adpilot_domain::rule::{AdvancedSettings, MatchMode, Rule, Scope, TimeRange};
use adpilot_domain::time::Timestamp;

use crate::codec::{decode_error, decode_opt_ts, encode_ts, lenient_json, lenient_json_list};
use crate::error::StorageError;

struct Wrapper(Rule);

/// Decode one row, surfacing a malformed rule field as a configuration error.
fn decode_rule(row: &SqliteRow) -> Result<Rule, AdPilotError> {
    match Wrapper::from_row(row) {
        Ok(Wrapper(rule)) => Ok(rule),
        Err(sqlx::Error::Decode(inner)) => match inner.downcast::<ConfigurationError>() {
            Ok(err) => Err(AdPilotError::Configuration(*err)),
            Err(other) => Err(StorageError::from(sqlx::Error::Decode(other)).into()),
        },
        Err(err) => Err(StorageError::from(err).into()),
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let user_id: uuid::Uuid = row.try_get("user_id")?;
        let name: String = row.try_get("name")?;
        let active: bool = row.try_get("active")?;
        let scope: String = row.try_get("scope")?;
        let time_range: String = row.try_get("time_range")?;
        let match_mode: String = row.try_get("match_mode")?;
        let conditions: String = row.try_get("conditions")?;
        let actions: String = row.try_get("actions")?;
        let steps: String = row.try_get("steps")?;
        let target_labels: String = row.try_get("target_labels")?;
        let settings: String = row.try_get("advanced_settings")?;
        let last_run_at: Option<String> = row.try_get("last_run_at")?;
        let last_run_status: Option<String> = row.try_get("last_run_status")?;
        let processing_since: Option<String> = row.try_get("processing_since")?;

        // Without a scope there is nothing sensible to evaluate.
        let scope = Scope::from_str(&scope).map_err(|err| {
            decode_error(ConfigurationError::MalformedRuleField {
                field: "scope",
                reason: err.to_string(),
            })
        })?;
        let time_range = TimeRange::from_str(&time_range).unwrap_or_else(|err| {
            tracing::warn!(rule_id = %id, error = %err, "malformed time range, using today");
            TimeRange::default()
        });
        let match_mode = serde_json::from_value::<MatchMode>(serde_json::Value::String(match_mode))
            .unwrap_or_default();
        let last_run_status = last_run_status
            .as_deref()
            .map(LogStatus::from_str)
            .transpose()
            .map_err(decode_error)?;

        Ok(Self(Rule {
            id: RuleId::from_uuid(id),
            user_id: UserId::from_uuid(user_id),
            name,
            active,
            scope,
            time_range,
            conditions: lenient_json("rules", "conditions", &conditions),
            match_mode,
            actions: lenient_json("rules", "actions", &actions),
            steps: lenient_json_list("rules", "steps", &steps),
            target_labels: lenient_json("rules", "target_labels", &target_labels),
            settings: lenient_json("rules", "advanced_settings", &settings),
            last_run_at: decode_opt_ts(last_run_at)?,
            last_run_status,
            processing_since: decode_opt_ts(processing_since)?,
        }))
    }
}

fn match_mode_str(mode: MatchMode) -> &'static str {
    match mode {
        MatchMode::All => "all",
        MatchMode::Any => "any",
    }
}

const INSERT: &str = r"
    INSERT INTO rules (
        id, user_id, name, active, scope, time_range, conditions, match_mode,
        actions, steps, target_labels, advanced_settings,
        last_run_at, last_run_status, processing_since
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const ACQUIRE_LOCK: &str = r"
    UPDATE rules SET processing_since = ?
    WHERE id = ? AND (processing_since IS NULL OR processing_since < ?)
";

/// `SQLite`-backed rule repository.
#[derive(Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: Rule) -> Result<Rule, AdPilotError> {
        let conditions = serde_json::to_string(&rule.conditions).map_err(StorageError::from)?;
        let actions = serde_json::to_string(&rule.actions).map_err(StorageError::from)?;
        let steps = serde_json::to_string(&rule.steps).map_err(StorageError::from)?;
        let target_labels =
            serde_json::to_string(&rule.target_labels).map_err(StorageError::from)?;
        let settings = serde_json::to_string(&rule.settings).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(rule.id.as_uuid())
            .bind(rule.user_id.as_uuid())
            .bind(&rule.name)
            .bind(rule.active)
            .bind(rule.scope.as_str())
            .bind(String::from(rule.time_range))
            .bind(&conditions)
            .bind(match_mode_str(rule.match_mode))
            .bind(&actions)
            .bind(&steps)
            .bind(&target_labels)
            .bind(&settings)
            .bind(rule.last_run_at.map(encode_ts))
            .bind(rule.last_run_status.map(LogStatus::as_str))
            .bind(rule.processing_since.map(encode_ts))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rule)
    }

    async fn get_by_id(&self, id: RuleId) -> Result<Option<Rule>, AdPilotError> {
        let row = sqlx::query("SELECT * FROM rules WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        row.as_ref().map(decode_rule).transpose()
    }

    async fn owner_of(&self, id: RuleId) -> Result<Option<UserId>, AdPilotError> {
        let owner: Option<uuid::Uuid> = sqlx::query_scalar("SELECT user_id FROM rules WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(owner.map(UserId::from_uuid))
    }

    async fn get_schedulable(&self) -> Result<Vec<RuleRef>, AdPilotError> {
        let rows = sqlx::query(
            "SELECT id, user_id, advanced_settings FROM rules WHERE active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        let mut refs = Vec::with_capacity(rows.len());
        for row in &rows {
            let decoded = (
                row.try_get::<uuid::Uuid, _>("id"),
                row.try_get::<uuid::Uuid, _>("user_id"),
                row.try_get::<String, _>("advanced_settings"),
            );
            let (Ok(id), Ok(user_id), Ok(settings)) = decoded else {
                tracing::warn!("unreadable rule identity, skipping");
                continue;
            };
            // auto_schedule lives in the settings JSON.
            let settings: AdvancedSettings = lenient_json("rules", "advanced_settings", &settings);
            if settings.auto_schedule {
                refs.push(RuleRef {
                    id: RuleId::from_uuid(id),
                    user_id: UserId::from_uuid(user_id),
                });
            }
        }
        Ok(refs)
    }

    async fn try_acquire_lock(
        &self,
        id: RuleId,
        now: Timestamp,
        stale_before: Timestamp,
    ) -> Result<bool, AdPilotError> {
        let result = sqlx::query(ACQUIRE_LOCK)
            .bind(encode_ts(now))
            .bind(id.as_uuid())
            .bind(encode_ts(stale_before))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, id: RuleId) -> Result<(), AdPilotError> {
        sqlx::query("UPDATE rules SET processing_since = NULL WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn update_last_run(
        &self,
        id: RuleId,
        status: LogStatus,
        at: Timestamp,
    ) -> Result<(), AdPilotError> {
        sqlx::query("UPDATE rules SET last_run_at = ?, last_run_status = ? WHERE id = ?")
            .bind(encode_ts(at))
            .bind(status.as_str())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
