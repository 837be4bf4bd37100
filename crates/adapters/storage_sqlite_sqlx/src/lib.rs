//! # autorule-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `RuleStore` and `TelemetryStore` ports defined in
//!   `autorule-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `autorule-app` (for port traits) and `autorule-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod rule_store;
pub mod telemetry_store;

pub use pool::{Config, Database};
pub use rule_store::SqliteRuleStore;
pub use telemetry_store::SqliteTelemetryStore;
