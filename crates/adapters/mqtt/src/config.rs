//! Broker connection settings for the command channel.

use std::time::Duration;

use rumqttc::{MqttOptions, QoS};
use serde::Deserialize;

/// Delivery guarantee requested for command publications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandQos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl From<CommandQos> for QoS {
    fn from(value: CommandQos) -> Self {
        match value {
            CommandQos::AtMostOnce => QoS::AtMostOnce,
            CommandQos::AtLeastOnce => QoS::AtLeastOnce,
            CommandQos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// Username and password sent in the CONNECT packet.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct MqttCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for MqttCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where and how commands are published.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// Commands go to `{base_topic}/{device_id}/commands`.
    pub base_topic: String,
    pub keep_alive_secs: u16,
    /// Pause after a connection error before polling again.
    pub reconnect_delay_secs: u16,
    pub qos: CommandQos,
    pub credentials: Option<MqttCredentials>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "autorule".to_string(),
            base_topic: "devices".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_secs: 5,
            qos: CommandQos::default(),
            credentials: None,
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_delay_secs))
    }

    /// Client options for a clean session against the configured broker.
    #[must_use]
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.client_id.clone(),
            self.broker_host.clone(),
            self.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        options.set_clean_session(true);
        if let Some(credentials) = &self.credentials {
            options.set_credentials(credentials.username.clone(), credentials.password.clone());
        }
        options
    }
}
