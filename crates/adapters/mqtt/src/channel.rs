//! [`CommandChannel`] backed by an MQTT broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use autorule_app::ports::CommandChannel;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Packet, QoS};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::MqttConfig;
use crate::error::MqttError;

/// Capacity of the request queue between the client and its event loop.
const REQUEST_CAPACITY: usize = 64;

/// Topic a device listens on for commands.
#[must_use]
pub fn command_topic(base_topic: &str, device_id: &DeviceId) -> String {
    format!("{}/{device_id}/commands", base_topic.trim_end_matches('/'))
}

/// Publishing half of the MQTT connection.
#[derive(Clone)]
pub struct MqttCommandChannel {
    client: AsyncClient,
    base_topic: String,
    qos: QoS,
    connected: Arc<AtomicBool>,
}

/// Connection half; must be polled (see [`MqttEventLoop::spawn`]) for
/// anything to reach the broker.
pub struct MqttEventLoop {
    eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
}

impl MqttCommandChannel {
    /// Create the client and its event loop. No connection is attempted
    /// until the event loop is polled.
    #[must_use]
    pub fn new(config: &MqttConfig) -> (Self, MqttEventLoop) {
        let (client, eventloop) = AsyncClient::new(config.mqtt_options(), REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        (
            Self {
                client,
                base_topic: config.base_topic.clone(),
                qos: config.qos.into(),
                connected: Arc::clone(&connected),
            },
            MqttEventLoop {
                eventloop,
                connected,
                reconnect_delay: config.reconnect_delay(),
            },
        )
    }

    /// Whether the broker acknowledged the current connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl CommandChannel for MqttCommandChannel {
    async fn publish_command(
        &self,
        device_id: &DeviceId,
        command: &Map<String, Value>,
    ) -> Result<bool, AutoRuleError> {
        if !self.is_connected() {
            warn!(device_id = %device_id, "MQTT broker not connected, command dropped");
            return Ok(false);
        }
        let topic = command_topic(&self.base_topic, device_id);
        let payload = serde_json::to_vec(command).map_err(MqttError::PayloadEncode)?;
        self.client
            .publish(topic.as_str(), self.qos, false, payload)
            .await
            .map_err(MqttError::Client)?;
        debug!(%topic, "command published");
        Ok(true)
    }
}

impl MqttEventLoop {
    /// Poll the connection forever, reconnecting after errors.
    pub async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let accepted = ack.code == ConnectReturnCode::Success;
                    self.connected.store(accepted, Ordering::SeqCst);
                    if accepted {
                        info!("connected to MQTT broker");
                    } else {
                        warn!(code = ?ack.code, "MQTT broker refused the connection");
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    warn!("MQTT broker closed the connection");
                }
                Ok(event) => trace!(?event, "MQTT event"),
                Err(err) => {
                    self.connected.store(false, Ordering::SeqCst);
                    warn!(error = %err, "MQTT connection error, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Drive the connection on the tokio runtime. Abort the returned handle
    /// to disconnect.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
