//! Domain blocklist.
//!
//! Hosts known not to work behind a rewriting proxy (auth portals, DRM
//! streaming, assistant chat UIs) are refused before any network I/O.
//! Matching is case-insensitive substring containment on the host, so
//! `notbing.com.example` is blocked by `bing.com` as well.

use url::Url;

use crate::config::BlocklistConfig;
use crate::error::ProxyError;

/// Static set of blocked host substrings.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    domains: Vec<String>,
}

impl Blocklist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &BlocklistConfig) -> Self {
        Self::new(&config.domains)
    }

    /// True if the URL's host contains any listed substring.
    pub fn is_blocked(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.domains.iter().any(|blocked| host.contains(blocked.as_str()))
    }

    /// Fail with `BlockedDomain` when the URL is blocked.
    pub fn check(&self, url: &Url) -> Result<(), ProxyError> {
        if self.is_blocked(url) {
            crate::observability::metrics::record_blocked();
            return Err(ProxyError::BlockedDomain {
                host: url.host_str().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
