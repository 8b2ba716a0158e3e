//! Cached response entries.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use std::time::{Duration, Instant};

/// A fully rewritten response ready to be replayed.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: StatusCode,
    /// Outbound headers, without the cache marker.
    pub headers: HeaderMap,
    pub body: Bytes,
    inserted_at: Instant,
}

impl CacheEntry {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            inserted_at: Instant::now(),
        }
    }

    /// Size charged against the byte budget.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}
