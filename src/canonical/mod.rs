//! URL canonicalization subsystem.
//!
//! # Data Flow
//! ```text
//! embedded reference (href, src, url(), ...)
//!     → resolve.rs (passthrough rules, relative → absolute)
//!     → codec.rs (percent-encode as one path segment)
//!     → "<prefix><encoded absolute URL>"
//!
//! inbound proxy path
//!     → strip prefix → codec.rs (decode) → resolve.rs (bare host → https)
//!     → absolute target URL
//! ```
//!
//! # Design Decisions
//! - Rewriting is idempotent: references under the proxy's own prefixes are kept
//! - A reference that fails to resolve is kept verbatim, never fatal
//! - `decode(encode(u)) == u` for every absolute URL

pub mod codec;
pub mod resolve;

use url::Url;

use crate::config::RouteConfig;
use crate::error::ProxyError;

pub use codec::{decode_component, encode_component};
pub use resolve::Resolved;

/// Maps references into and out of the proxy path scheme.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    proxy_prefix: String,
    websocket_prefix: String,
}

impl Canonicalizer {
    pub fn new(proxy_prefix: impl Into<String>, websocket_prefix: impl Into<String>) -> Self {
        Self {
            proxy_prefix: proxy_prefix.into(),
            websocket_prefix: websocket_prefix.into(),
        }
    }

    pub fn from_config(routes: &RouteConfig) -> Self {
        Self::new(routes.proxy_prefix.clone(), routes.websocket_prefix.clone())
    }

    pub fn proxy_prefix(&self) -> &str {
        &self.proxy_prefix
    }

    pub fn websocket_prefix(&self) -> &str {
        &self.websocket_prefix
    }

    /// Resolve a reference found in a document served from `base`.
    pub fn resolve(&self, reference: &str, base: &Url) -> Result<Resolved, ProxyError> {
        resolve::resolve_reference(
            reference,
            base,
            &[self.proxy_prefix.as_str(), self.websocket_prefix.as_str()],
        )
    }

    /// Encode an absolute URL into a proxy path.
    pub fn encode(&self, url: &Url) -> String {
        format!("{}{}", self.proxy_prefix, encode_component(url.as_str()))
    }

    /// Encode a WebSocket URL into a relay path.
    pub fn encode_websocket(&self, url: &Url) -> String {
        format!("{}{}", self.websocket_prefix, encode_component(url.as_str()))
    }

    /// Decode a proxy path (prefix included) back into its target URL.
    pub fn decode(&self, path: &str) -> Result<Url, ProxyError> {
        let encoded = strip_prefix(path, &self.proxy_prefix)?;
        resolve::parse_entry_target(&decode_component(encoded)?)
    }

    /// Decode a relay path (prefix included) back into its WebSocket target.
    pub fn decode_websocket(&self, path: &str) -> Result<Url, ProxyError> {
        let encoded = strip_prefix(path, &self.websocket_prefix)?;
        resolve::parse_websocket_target(&decode_component(encoded)?)
    }

    /// Rewrite one embedded reference. `None` means keep the original text,
    /// either because it is never proxied or because it did not resolve.
    pub fn rewrite(&self, reference: &str, base: &Url) -> Option<String> {
        match self.resolve(reference, base) {
            Ok(Resolved::Absolute(url)) => Some(self.encode(&url)),
            Ok(Resolved::Unchanged) => None,
            Err(e) => {
                tracing::trace!(error = %e, "Keeping unresolvable reference");
                None
            }
        }
    }
}

fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Result<&'a str, ProxyError> {
    path.strip_prefix(prefix)
        .ok_or_else(|| ProxyError::InvalidUrl {
            reference: path.to_string(),
        })
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::from_config(&RouteConfig::default())
    }
}
