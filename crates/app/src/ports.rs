//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the rule engine and the outside world.
//! They are defined here (in `app`) so that both the engine and the adapter
//! layer can depend on them without creating circular dependencies.

pub mod clock;
pub mod command_channel;
pub mod rule_store;
pub mod telemetry_store;
pub mod webhook;

pub use clock::{Clock, SystemClock};
pub use command_channel::CommandChannel;
pub use rule_store::RuleStore;
pub use telemetry_store::TelemetryStore;
pub use webhook::{WebhookClient, WebhookRequest, WebhookResponse};
