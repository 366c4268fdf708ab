use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest response window GDPR Art.12(3) allows (one month plus a two-month extension)
pub const MAX_REQUEST_DEADLINE_DAYS: u32 = 90;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ledger policy settings
    pub compliance: ComplianceSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.compliance.validate()
    }
}

/// Policy constants used by the personal data store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceSettings {
    /// Retention applied when a collection does not specify one
    pub default_retention_months: u32,

    /// Statutory response window for data subject requests (GDPR Art.12(3))
    pub request_deadline_days: u32,

    /// Simulated identity verification delay in milliseconds
    pub verification_delay_ms: u64,

    /// Statutory retention floor for financial records
    pub financial_retention_years: u32,

    /// Verification method that triggers automatic fulfilment
    pub email_verification_method: String,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            default_retention_months: 36,
            request_deadline_days: 30,
            verification_delay_ms: 1000,
            financial_retention_years: 7,
            email_verification_method: "email_verification".to_string(),
        }
    }
}

impl ComplianceSettings {
    /// Verification delay as a [`Duration`]
    pub fn verification_delay(&self) -> Duration {
        Duration::from_millis(self.verification_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_deadline_days == 0 {
            return Err(Error::Config(
                "compliance.request_deadline_days must be greater than zero".to_string(),
            ));
        }
        if self.request_deadline_days > MAX_REQUEST_DEADLINE_DAYS {
            return Err(Error::Config(format!(
                "compliance.request_deadline_days must be at most {}",
                MAX_REQUEST_DEADLINE_DAYS
            )));
        }
        if self.financial_retention_years == 0 {
            return Err(Error::Config(
                "compliance.financial_retention_years must be greater than zero".to_string(),
            ));
        }
        if self.email_verification_method.trim().is_empty() {
            return Err(Error::Config(
                "compliance.email_verification_method must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level / EnvFilter directive
    pub level: String,

    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,

    /// Rotation: daily, hourly or never
    pub rotation: String,

    /// Write to stderr
    pub console: bool,

    /// Write to rolling files
    pub file: bool,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            rotation: "daily".to_string(),
            console: true,
            file: false,
            json: false,
        }
    }
}
