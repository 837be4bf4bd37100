//! # autorule-adapter-virtual
//!
//! In-memory implementations of every engine port, for tests, demos and
//! running without a broker.
//!
//! ## Provided pieces
//!
//! | Type | Port | Behaviour |
//! |------|------|-----------|
//! | [`VirtualRuleStore`] | `RuleStore` | Rules held in memory |
//! | [`VirtualTelemetryStore`] | `TelemetryStore` | Samples and device statuses held in memory |
//! | [`VirtualCommandChannel`] | `CommandChannel` | Simulated devices answering `turn_on` / `turn_off` / `toggle` |
//!
//! ## Dependency rule
//!
//! Depends on `autorule-app` (port traits) and `autorule-domain` only.

mod commands;
mod rules;
mod telemetry;

pub use commands::{SentCommand, VirtualCommandChannel};
pub use rules::VirtualRuleStore;
pub use telemetry::VirtualTelemetryStore;
