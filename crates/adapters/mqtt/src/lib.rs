//! # autorule-adapter-mqtt
//!
//! MQTT adapter: delivers device commands through a broker.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker and keep the connection alive
//! - Track whether the broker has acknowledged the connection
//! - Implement the `CommandChannel` port by publishing each command as JSON
//!   on `{base_topic}/{device_id}/commands`
//!
//! ## Dependency rule
//! Same as other adapters: depends on `autorule-app` and `autorule-domain`.

pub mod channel;
pub mod config;
pub mod error;

pub use channel::{MqttCommandChannel, MqttEventLoop, command_topic};
pub use config::{CommandQos, MqttConfig, MqttCredentials};
pub use error::MqttError;
