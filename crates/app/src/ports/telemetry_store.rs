//! Telemetry store port: recent samples and device status.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use autorule_domain::telemetry::TelemetrySample;
use autorule_domain::time::Timestamp;

/// Read access to the telemetry history and the device registry.
pub trait TelemetryStore {
    /// Samples for `(device_id, data_type)` taken at or after `since`,
    /// newest first, at most `limit` of them.
    fn recent_samples(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TelemetrySample>, AutoRuleError>> + Send;

    /// The newest sample for `(device_id, data_type)` taken at or after `since`.
    fn latest_sample(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
    ) -> impl Future<Output = Result<Option<TelemetrySample>, AutoRuleError>> + Send {
        let samples = self.recent_samples(device_id, data_type, since, 1);
        async move { Ok(samples.await?.into_iter().next()) }
    }

    /// Current status string of a device, `None` when the device is unknown.
    fn device_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<String>, AutoRuleError>> + Send;
}

impl<T: TelemetryStore + Send + Sync> TelemetryStore for Arc<T> {
    fn recent_samples(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TelemetrySample>, AutoRuleError>> + Send {
        (**self).recent_samples(device_id, data_type, since, limit)
    }

    fn latest_sample(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
    ) -> impl Future<Output = Result<Option<TelemetrySample>, AutoRuleError>> + Send {
        (**self).latest_sample(device_id, data_type, since)
    }

    fn device_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<String>, AutoRuleError>> + Send {
        (**self).device_status(device_id)
    }
}
