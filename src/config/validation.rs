//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and cross-field
//! consistency. All errors are returned, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must start and end with '/', got {value:?}")]
    BadPrefix { field: &'static str, value: String },

    #[error("proxy_prefix and websocket_prefix must differ and not nest")]
    PrefixCollision,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("cache.max_entry_bytes ({entry}) exceeds cache.max_bytes ({total})")]
    EntryCeilingTooLarge { entry: usize, total: usize },

    #[error("{field} is not a socket address: {value:?}")]
    BadAddress { field: &'static str, value: String },

    #[error("admin.api_key must be set when admin is enabled")]
    MissingApiKey,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("routes.proxy_prefix", &config.routes.proxy_prefix),
        ("routes.websocket_prefix", &config.routes.websocket_prefix),
    ] {
        if value.len() < 2 || !value.starts_with('/') || !value.ends_with('/') {
            errors.push(ValidationError::BadPrefix { field, value: value.clone() });
        }
    }
    let (proxy, websocket) = (&config.routes.proxy_prefix, &config.routes.websocket_prefix);
    if proxy.starts_with(websocket.as_str()) || websocket.starts_with(proxy.as_str()) {
        errors.push(ValidationError::PrefixCollision);
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "upstream.timeout_secs" });
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "upstream.connect_timeout_secs" });
    }
    if config.upstream.max_rewrite_bytes == 0 {
        errors.push(ValidationError::Zero { field: "upstream.max_rewrite_bytes" });
    }

    if config.cache.enabled {
        if config.cache.max_entries == 0 {
            errors.push(ValidationError::Zero { field: "cache.max_entries" });
        }
        if config.cache.ttl_secs == 0 {
            errors.push(ValidationError::Zero { field: "cache.ttl_secs" });
        }
        if config.cache.max_entry_bytes > config.cache.max_bytes {
            errors.push(ValidationError::EntryCeilingTooLarge {
                entry: config.cache.max_entry_bytes,
                total: config.cache.max_bytes,
            });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
