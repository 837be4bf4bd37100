//! Telemetry: timestamped numeric observations reported by devices.
//!
//! Samples are append-only and produced by an external ingestion path.

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::time::Timestamp;

/// One `(device, data type, value)` observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: DeviceId,
    /// Label such as `temperature`, `humidity` or `motion`.
    pub data_type: String,
    pub value: f64,
    pub unit: Option<String>,
    pub timestamp: Timestamp,
}

impl TelemetrySample {
    #[must_use]
    pub fn new(
        device_id: impl Into<DeviceId>,
        data_type: impl Into<String>,
        value: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            data_type: data_type.into(),
            value,
            unit: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}
