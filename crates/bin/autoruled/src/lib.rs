//! Library half of `autoruled`: configuration loading and the demo rule set,
//! shared by the daemon and its integration tests.

pub mod config;
pub mod seed;
