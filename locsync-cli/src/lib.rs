//! CLI library for testing purposes

pub mod config;
pub mod exit;
pub mod merge;
pub mod report;
pub mod sync;
pub mod validation;

pub use config::{ConfigError, SyncConfig};
pub use exit::Failure;
