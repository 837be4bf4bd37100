//! Command channel port: fire-and-forget device commands.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use serde_json::{Map, Value};

/// Outbound channel delivering commands to devices.
pub trait CommandChannel {
    /// Publish `command` verbatim to `device_id`.
    ///
    /// Resolves to `Ok(false)` when the channel is up but refused the
    /// message (for instance while the broker connection is down).
    fn publish_command(
        &self,
        device_id: &DeviceId,
        command: &Map<String, Value>,
    ) -> impl Future<Output = Result<bool, AutoRuleError>> + Send;
}

impl<T: CommandChannel + Send + Sync> CommandChannel for Arc<T> {
    fn publish_command(
        &self,
        device_id: &DeviceId,
        command: &Map<String, Value>,
    ) -> impl Future<Output = Result<bool, AutoRuleError>> + Send {
        (**self).publish_command(device_id, command)
    }
}
