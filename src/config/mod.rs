//! Configuration
//!
//! Typed settings layered from defaults, an optional file and `GDPR_*` environment variables.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{AppConfig, ComplianceSettings, LoggingSettings};
