//! MQTT adapter error types.

use autorule_domain::error::AutoRuleError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error: {0}")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to encode a command payload as JSON.
    #[error("failed to encode MQTT payload: {0}")]
    PayloadEncode(#[source] serde_json::Error),
}

impl From<MqttError> for AutoRuleError {
    fn from(err: MqttError) -> Self {
        Self::transient(err)
    }
}
