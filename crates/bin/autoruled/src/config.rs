//! Daemon settings.
//!
//! Read from `autorule.toml` in the working directory, or from the file named
//! by `AUTORULE_CONFIG`. The file is optional and every key has a default;
//! `AUTORULE_*` variables (and `RUST_LOG`) win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use autorule_adapter_mqtt::MqttConfig;
use autorule_adapter_webhook_reqwest::WebhookConfig;
use autorule_app::automation_engine::EngineConfig;
use autorule_domain::condition::TriggerCondition;
use serde::Deserialize;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "autorule.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub database: DatabaseConfig,
    pub mqtt: MqttSection,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

/// `[engine]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Seconds between two ticks.
    pub tick_interval_secs: u64,
    /// Rate limit for rules that do not set `min_interval_seconds`.
    pub default_min_interval_secs: u64,
    /// Forget the fire state of rules that are no longer active.
    pub evict_stale_fire_state: bool,
}

/// `[database]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx `SQLite` URL holding rules, telemetry and device statuses.
    pub url: String,
}

/// `[mqtt]` section: an on/off switch plus the broker settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    /// When false, commands are delivered to simulated devices instead.
    pub enabled: bool,
    #[serde(flatten)]
    pub broker: MqttConfig,
}

/// `[logging]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `autorule_app=debug,info`.
    pub filter: String,
}

/// `[demo]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Insert the sample rules when the rule store is empty.
    pub seed_sample_rules: bool,
}

impl Config {
    /// Settings for this process: file, then environment.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable or malformed file and on invalid values. A
    /// missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    fn resolve(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = var("AUTORULE_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(var);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("AUTORULE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(secs) = var("AUTORULE_TICK_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.engine.tick_interval_secs = secs;
        }
        if let Some(val) = var("AUTORULE_MQTT_HOST") {
            self.mqtt.broker.broker_host = val;
        }
        if let Some(port) = var("AUTORULE_MQTT_PORT").and_then(|v| v.parse().ok()) {
            self.mqtt.broker.broker_port = port;
        }
        if let Some(val) = var("AUTORULE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.tick_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.mqtt.enabled && self.mqtt.broker.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt.broker_port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine settings in the form the rule engine expects.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_secs(self.engine.tick_interval_secs),
            default_min_interval_seconds: self.engine.default_min_interval_secs,
            evict_stale_fire_state: self.engine.evict_stale_fire_state,
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            default_min_interval_secs: TriggerCondition::DEFAULT_MIN_INTERVAL_SECONDS,
            evict_stale_fire_state: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:autorule.db?mode=rwc".to_string(),
        }
    }
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: MqttConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "autoruled=info,autorule_app=info,autorule_adapter_mqtt=info".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}
