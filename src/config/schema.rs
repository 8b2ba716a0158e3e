//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Mount points of the proxy path schemes.
    pub routes: RouteConfig,

    /// Upstream fetch settings.
    pub upstream: UpstreamConfig,

    /// Response cache budgets.
    pub cache: CacheConfig,

    /// Domains that are refused before any network call.
    pub blocklist: BlocklistConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum inbound request body forwarded upstream, in bytes.
    pub max_body_bytes: usize,

    /// Compress responses for clients that accept gzip or brotli.
    pub compression: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            compression: true,
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Mount points for the HTTP and WebSocket path schemes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Prefix of proxied HTTP paths, with leading and trailing slash.
    pub proxy_prefix: String,

    /// Prefix of relayed WebSocket paths, with leading and trailing slash.
    pub websocket_prefix: String,

    /// Home view of the host application, linked from the error page.
    pub home_path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            proxy_prefix: "/proxy/".to_string(),
            websocket_prefix: "/ws/".to_string(),
            home_path: "/".to_string(),
        }
    }
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Deadline for the response head, and for bodies buffered for
    /// rewriting or caching. Also the idle limit between body reads.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Maximum number of redirects followed.
    pub max_redirects: usize,

    /// User-Agent sent when the browser did not supply one.
    pub user_agent: String,

    /// Accept-Language sent when the browser did not supply one.
    pub accept_language: String,

    /// Largest HTML/CSS body rewritten in memory. Larger bodies are
    /// streamed through unrewritten and uncached.
    pub max_rewrite_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 10,
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            max_rewrite_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache.
    pub enabled: bool,

    /// Maximum number of resident entries.
    pub max_entries: usize,

    /// Maximum total resident body size in bytes.
    pub max_bytes: usize,

    /// Bodies larger than this are served but never cached.
    pub max_entry_bytes: usize,

    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,

    /// Interval of the background expiry sweep in seconds (0 = lazy only).
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 200,
            max_bytes: 50 * 1024 * 1024,
            max_entry_bytes: 5 * 1024 * 1024,
            ttl_secs: 600,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Domain blocklist configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlocklistConfig {
    /// Host substrings matched case-insensitively.
    pub domains: Vec<String>,
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            domains: [
                "chatgpt.com",
                "openai.com",
                "claude.ai",
                "bard.google.com",
                "bing.com",
                "netflix.com",
                "hulu.com",
                "disney.com",
                "accounts.google.com",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
        }
    }
}
