use gateway::config::{Config as GatewayConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug, Default)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CommonConfig {
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Loads and validates the config file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.gateway.validate()?;

        Ok(config)
    }

    pub fn sentry_dsn(&self) -> Option<&str> {
        self.common
            .logging
            .as_ref()
            .and_then(|logging| logging.sentry_dsn.as_deref())
            .filter(|dsn| !dsn.is_empty())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}
