//! # autorule-app
//!
//! Application layer: the rule engine and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `RuleStore`: read the active automation rules
//!   - `TelemetryStore`: query recent samples and device status
//!   - `CommandChannel`: publish a command to a device
//!   - `WebhookClient`: perform an outbound HTTP call
//!   - `Clock`: current instant, in UTC and in local time
//! - Evaluate condition trees (`ConditionEvaluator`)
//! - Execute action trees (`ActionExecutor`)
//! - Drive the periodic tick, rate limiting and fire-state bookkeeping
//!   (`RuleEngine`)
//!
//! ## Dependency rule
//! Depends on `autorule-domain` only (plus `tokio` for timers and the stop
//! signal). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod automation_engine;
pub mod evaluator;
pub mod executor;
pub mod fire_state;
pub mod ports;

#[cfg(test)]
mod fakes;
