//! `SQLite` implementation of [`TelemetryStore`].
//!
//! Sample times are stored as Unix milliseconds so window filters and
//! newest-first ordering are plain integer comparisons. Samples sharing a
//! timestamp are ordered by insertion.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use autorule_app::ports::TelemetryStore;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use autorule_domain::telemetry::TelemetrySample;
use autorule_domain::time::{Timestamp, from_unix_millis, to_unix_millis};

use crate::error::StorageError;

struct Wrapper(TelemetrySample);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let device_id: String = row.try_get("device_id")?;
        let data_type: String = row.try_get("data_type")?;
        let value: f64 = row.try_get("value")?;
        let unit: Option<String> = row.try_get("unit")?;
        let recorded_at_ms: i64 = row.try_get("recorded_at_ms")?;

        let timestamp = from_unix_millis(recorded_at_ms).ok_or_else(|| {
            sqlx::Error::Decode(format!("timestamp {recorded_at_ms} out of range").into())
        })?;

        Ok(Self(TelemetrySample {
            device_id: DeviceId::new(device_id),
            data_type,
            value,
            unit,
            timestamp,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO telemetry (device_id, data_type, value, unit, recorded_at_ms)
    VALUES (?, ?, ?, ?, ?)
";

const SELECT_RECENT: &str = r"
    SELECT * FROM telemetry
    WHERE device_id = ? AND data_type = ? AND recorded_at_ms >= ?
    ORDER BY recorded_at_ms DESC, id DESC
    LIMIT ?
";

const UPSERT_STATUS: &str = r"
    INSERT INTO devices (device_id, status) VALUES (?, ?)
    ON CONFLICT (device_id) DO UPDATE SET status = excluded.status
";

const SELECT_STATUS: &str = "SELECT status FROM devices WHERE device_id = ?";

/// `SQLite`-backed telemetry store and device registry.
#[derive(Clone)]
pub struct SqliteTelemetryStore {
    pool: SqlitePool,
}

impl SqliteTelemetryStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a sample.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn record(&self, sample: &TelemetrySample) -> Result<(), AutoRuleError> {
        sqlx::query(INSERT)
            .bind(sample.device_id.as_str())
            .bind(&sample.data_type)
            .bind(sample.value)
            .bind(&sample.unit)
            .bind(to_unix_millis(sample.timestamp))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Register a device or update its status.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the upsert fails.
    pub async fn set_device_status(
        &self,
        device_id: &DeviceId,
        status: &str,
    ) -> Result<(), AutoRuleError> {
        sqlx::query(UPSERT_STATUS)
            .bind(device_id.as_str())
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl TelemetryStore for SqliteTelemetryStore {
    async fn recent_samples(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<TelemetrySample>, AutoRuleError> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(device_id.as_str())
            .bind(data_type)
            .bind(to_unix_millis(since))
            .bind(limit_i64)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn device_status(&self, device_id: &DeviceId) -> Result<Option<String>, AutoRuleError> {
        let row: Option<(String,)> = sqlx::query_as(SELECT_STATUS)
            .bind(device_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|(status,)| status))
    }
}
