//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Port(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Port(v) => write!(f, "Invalid {} value: {:?}", PORT_ENV, v),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML document into a configuration (no validation).
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            parse_config(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_port_override(&mut config, std::env::var(PORT_ENV).ok())?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply a `PORT`-style override to the listener bind address.
pub fn apply_port_override(
    config: &mut ProxyConfig,
    raw: Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = raw {
        let port: u16 = raw.trim().parse().map_err(|_| ConfigError::Port(raw.clone()))?;
        config.listener.set_port(port);
    }
    Ok(())
}
