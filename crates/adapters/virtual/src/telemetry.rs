use std::collections::HashMap;
use std::sync::Arc;

use autorule_app::ports::TelemetryStore;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use autorule_domain::telemetry::TelemetrySample;
use autorule_domain::time::Timestamp;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    samples: Vec<TelemetrySample>,
    statuses: HashMap<DeviceId, String>,
}

/// Telemetry history and device registry held in memory.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct VirtualTelemetryStore {
    state: Arc<RwLock<State>>,
}

impl VirtualTelemetryStore {
    pub async fn record(&self, sample: TelemetrySample) {
        self.state.write().await.samples.push(sample);
    }

    pub async fn set_device_status(&self, device_id: &DeviceId, status: impl Into<String>) {
        self.state
            .write()
            .await
            .statuses
            .insert(device_id.clone(), status.into());
    }
}

impl TelemetryStore for VirtualTelemetryStore {
    async fn recent_samples(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<TelemetrySample>, AutoRuleError> {
        let state = self.state.read().await;
        // Reverse first so that, among equal timestamps, the latest insert wins.
        let mut found: Vec<_> = state
            .samples
            .iter()
            .rev()
            .filter(|s| &s.device_id == device_id && s.data_type == data_type)
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        found.truncate(limit);
        Ok(found)
    }

    async fn device_status(&self, device_id: &DeviceId) -> Result<Option<String>, AutoRuleError> {
        Ok(self.state.read().await.statuses.get(device_id).cloned())
    }
}
