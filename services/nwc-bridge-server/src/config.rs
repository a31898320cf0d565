//! Server Configuration
//!
//! Layered from `config/default`, `config/local`, an optional file and
//! `NWC__` prefixed environment variables, in increasing priority.

use std::net::SocketAddr;

use anyhow::Context;
use nwc_budget::BudgetConfig;
use nwc_db::DatabaseConfig;
use nwc_vasp::VaspConfig;
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    /// PostgreSQL settings; the in-memory store is used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub vasp: VaspConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ServerConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("NWC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut server_config: ServerConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid configuration")?;

        if server_config.database.is_none() {
            server_config.database = DatabaseConfig::from_env();
        }
        server_config.budget.validate()?;

        Ok(server_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_bind_to_localhost() {
        let config = ServerConfig::default();
        assert_eq!(config.server.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert!(config.database.is_none());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_invalid_host_is_an_error() {
        let settings = ServerSettings {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(settings.socket_addr().is_err());
    }
}
