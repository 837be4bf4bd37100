//! # autoruled: automation rule daemon
//!
//! Composition root that wires all adapters together and runs the rule
//! engine until interrupted.
//!
//! ## Responsibilities
//! - Load configuration (`autorule.toml`, environment overrides)
//! - Install the tracing subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Optionally seed the demo rules into an empty store
//! - Connect the MQTT command channel, or fall back to simulated devices
//! - Start the engine loop and stop it on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

use autorule_adapter_mqtt::MqttCommandChannel;
use autorule_adapter_storage_sqlite_sqlx::{
    Config as DatabaseConfig, SqliteRuleStore, SqliteTelemetryStore,
};
use autorule_adapter_virtual::VirtualCommandChannel;
use autorule_adapter_webhook_reqwest::ReqwestWebhookClient;
use autorule_app::automation_engine::{EngineConfig, RuleEngine};
use autorule_app::ports::CommandChannel;
use autorule_domain::id::OwnerId;
use autoruled::config::Config;
use autoruled::seed;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = DatabaseConfig {
        database_url: config.database.url.clone(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Stores
    let rules = SqliteRuleStore::new(pool.clone());
    let telemetry = SqliteTelemetryStore::new(pool);

    if config.demo.seed_sample_rules && rules.count().await? == 0 {
        let samples = seed::sample_rules(OwnerId::new())?;
        for rule in &samples {
            rules.insert(rule).await?;
        }
        info!(count = samples.len(), "seeded sample rules");
    }

    // Outbound channels
    let webhooks = ReqwestWebhookClient::new(&config.webhook)?;
    let engine_config = config.engine_config();

    let result = if config.mqtt.enabled {
        let (commands, eventloop) = MqttCommandChannel::new(&config.mqtt.broker);
        let connection = eventloop.spawn();
        info!(
            host = %config.mqtt.broker.broker_host,
            port = config.mqtt.broker.broker_port,
            "publishing commands over MQTT"
        );
        let result = run_until_interrupted(rules, telemetry, commands, webhooks, engine_config).await;
        connection.abort();
        result
    } else {
        warn!("MQTT disabled, commands go to simulated devices");
        let commands = VirtualCommandChannel::default();
        run_until_interrupted(rules, telemetry, commands, webhooks, engine_config).await
    };

    db.close().await;
    result
}

async fn run_until_interrupted<CC>(
    rules: SqliteRuleStore,
    telemetry: SqliteTelemetryStore,
    commands: CC,
    webhooks: ReqwestWebhookClient,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>>
where
    CC: CommandChannel + Sync + Send + 'static,
{
    let handle = RuleEngine::new(rules, telemetry, commands, webhooks, config).spawn();

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, waiting for the current tick");
    handle.shutdown().await?;
    Ok(())
}
