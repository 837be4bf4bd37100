//! `SQLite` implementation of [`RuleStore`].
//!
//! Condition and action trees are stored as JSON text and decoded totally:
//! a malformed document loads as an unsupported node instead of failing
//! the whole query. A row whose columns cannot be decoded at all is logged
//! and skipped.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use tracing::warn;

use autorule_app::ports::RuleStore;
use autorule_domain::action::ActionTree;
use autorule_domain::condition::TriggerCondition;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::{DeviceId, OwnerId, RuleId};
use autorule_domain::rule::AutomationRule;
use autorule_domain::time::{self, Timestamp};

use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(AutomationRule);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let description: Option<String> = row.try_get("description")?;
        let trigger_device_id: String = row.try_get("trigger_device_id")?;
        let trigger_json: String = row.try_get("trigger_condition")?;
        let action_device_id: String = row.try_get("action_device_id")?;
        let action_json: String = row.try_get("action_command")?;
        let is_active: bool = row.try_get("is_active")?;
        let owner_id: uuid::Uuid = row.try_get("owner_id")?;
        let created_at_str: String = row.try_get("created_at")?;

        // rows written by hand often carry `datetime('now')`, which has no offset
        let created_at = time::parse_utc(&created_at_str).unwrap_or_else(|| {
            warn!(rule_id = %id, created_at = %created_at_str, "unreadable creation time");
            DateTime::<Utc>::UNIX_EPOCH
        });

        Ok(Self(AutomationRule {
            id: RuleId::from_uuid(id),
            name,
            description,
            trigger_device_id: DeviceId::new(trigger_device_id),
            trigger_condition: TriggerCondition::from_json_str(&trigger_json),
            action_device_id: DeviceId::new(action_device_id),
            action_command: ActionTree::from_json_str(&action_json),
            is_active,
            owner_id: OwnerId::from_uuid(owner_id),
            created_at,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO automation_rules (
        id, name, description, trigger_device_id, trigger_condition,
        action_device_id, action_command, is_active, owner_id, created_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_ACTIVE: &str = r"
    SELECT *, hex(id) AS row_key FROM automation_rules
    WHERE is_active = 1
    ORDER BY created_at ASC, id ASC
";

const SET_ACTIVE: &str = "UPDATE automation_rules SET is_active = ? WHERE id = ?";

const COUNT: &str = "SELECT COUNT(*) FROM automation_rules";

fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `SQLite`-backed rule store.
#[derive(Clone)]
pub struct SqliteRuleStore {
    pool: SqlitePool,
}

impl SqliteRuleStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`AutoRuleError::Validation`] for an invalid rule, or a
    /// storage error if the insert fails.
    pub async fn insert(&self, rule: &AutomationRule) -> Result<(), AutoRuleError> {
        rule.validate()?;
        let trigger_json =
            serde_json::to_string(&rule.trigger_condition).map_err(StorageError::from)?;
        let action_json =
            serde_json::to_string(&rule.action_command).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(rule.id.as_uuid())
            .bind(&rule.name)
            .bind(&rule.description)
            .bind(rule.trigger_device_id.as_str())
            .bind(&trigger_json)
            .bind(rule.action_device_id.as_str())
            .bind(&action_json)
            .bind(rule.is_active)
            .bind(rule.owner_id.as_uuid())
            .bind(format_timestamp(rule.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    /// Toggle a rule. Returns `false` when no rule has this id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn set_active(&self, id: RuleId, is_active: bool) -> Result<bool, AutoRuleError> {
        let result = sqlx::query(SET_ACTIVE)
            .bind(is_active)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of stored rules, active or not.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn count(&self) -> Result<u64, AutoRuleError> {
        let (count,): (i64,) = sqlx::query_as(COUNT)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl RuleStore for SqliteRuleStore {
    async fn active_rules(&self) -> Result<Vec<AutomationRule>, AutoRuleError> {
        let rows = sqlx::query(SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            match Wrapper::from_row(row) {
                Ok(Wrapper(rule)) => rules.push(rule),
                Err(error) => {
                    let row_key: String = row.try_get("row_key").unwrap_or_default();
                    warn!(%row_key, %error, "skipping undecodable rule row");
                }
            }
        }
        Ok(rules)
    }
}
