//! # autorule-domain
//!
//! Pure domain model for the autorule automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Rules** (trigger condition + action tree + active flag)
//! - Define **Telemetry samples** (timestamped device observations)
//! - Define the **Condition tree** (threshold, change, time, status, composite)
//! - Define the **Action tree** (device command, notification, webhook, delay, sequence)
//! - Decode the JSON wire format of both trees without ever failing
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod condition;
pub mod rule;
pub mod telemetry;
