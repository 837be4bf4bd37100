//! # autorule-adapter-webhook-reqwest
//!
//! Outbound HTTP adapter using [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement the `WebhookClient` port defined in `autorule-app::ports`
//! - Send `POST` payloads as JSON bodies and `GET` payloads as query strings
//! - Apply the per-request timeout and headers of each webhook action
//!
//! ## Dependency rule
//! Depends on `autorule-app` (for port traits) and `autorule-domain` (for domain types).

pub mod client;
pub mod error;

pub use client::{ReqwestWebhookClient, WebhookConfig};
pub use error::WebhookError;
