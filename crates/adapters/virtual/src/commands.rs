use std::collections::HashSet;
use std::sync::Arc;

use autorule_app::ports::{CommandChannel, TelemetryStore};
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::info;

use crate::telemetry::VirtualTelemetryStore;

/// A command accepted by the virtual channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SentCommand {
    pub device_id: DeviceId,
    pub command: Map<String, Value>,
}

/// Command channel delivering to simulated devices.
///
/// When attached to a [`VirtualTelemetryStore`], the `action` field of each
/// command drives the device status: `turn_on` sets `on`, `turn_off` sets
/// `off` and `toggle` flips between the two.
#[derive(Clone, Default)]
pub struct VirtualCommandChannel {
    sent: Arc<RwLock<Vec<SentCommand>>>,
    offline: Arc<RwLock<HashSet<DeviceId>>>,
    devices: Option<VirtualTelemetryStore>,
}

impl VirtualCommandChannel {
    /// A channel whose commands update device statuses in `devices`.
    #[must_use]
    pub fn with_devices(devices: VirtualTelemetryStore) -> Self {
        Self {
            devices: Some(devices),
            ..Self::default()
        }
    }

    /// Make publishing to `device_id` fail as if the device were unreachable.
    pub async fn set_offline(&self, device_id: &DeviceId, offline: bool) {
        let mut set = self.offline.write().await;
        if offline {
            set.insert(device_id.clone());
        } else {
            set.remove(device_id);
        }
    }

    /// Every command accepted so far, oldest first.
    pub async fn sent(&self) -> Vec<SentCommand> {
        self.sent.read().await.clone()
    }
}

async fn apply_action(
    devices: &VirtualTelemetryStore,
    device_id: &DeviceId,
    action: &str,
) -> Result<(), AutoRuleError> {
    let status = match action {
        "turn_on" => "on",
        "turn_off" => "off",
        "toggle" => match devices.device_status(device_id).await?.as_deref() {
            Some("on") => "off",
            _ => "on",
        },
        _ => return Ok(()),
    };
    devices.set_device_status(device_id, status).await;
    Ok(())
}

impl CommandChannel for VirtualCommandChannel {
    async fn publish_command(
        &self,
        device_id: &DeviceId,
        command: &Map<String, Value>,
    ) -> Result<bool, AutoRuleError> {
        if self.offline.read().await.contains(device_id) {
            return Ok(false);
        }
        if let (Some(devices), Some(action)) =
            (&self.devices, command.get("action").and_then(Value::as_str))
        {
            apply_action(devices, device_id, action).await?;
        }
        info!(device_id = %device_id, command = ?command, "virtual device received command");
        self.sent.write().await.push(SentCommand {
            device_id: device_id.clone(),
            command: command.clone(),
        });
        Ok(true)
    }
}
