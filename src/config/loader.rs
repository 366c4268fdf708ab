use super::types::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    load_env: bool,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_file: None,
            load_env: false,
            env_prefix: "GDPR".to_string(),
        }
    }

    /// Load configuration from file
    pub fn load_from_file(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.config_file = path.map(Into::into);
        self
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Override the environment variable prefix (default `GDPR`)
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<AppConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(config_path) = &self.config_file {
            // An explicit path must exist
            builder = builder.add_source(File::from(config_path.as_path()).required(true));
        } else {
            builder = builder
                .add_source(File::with_name("gdpr-ledger").required(false))
                .add_source(File::with_name("config/gdpr-ledger").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid configuration")?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
