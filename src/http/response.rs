//! Outbound response shaping.
//!
//! # Responsibilities
//! - Copy upstream headers minus framing restrictions and hop-by-hop headers
//! - Add the permissive CORS set and `X-Frame-Options: ALLOWALL`
//! - Mark cache status (`X-Cache: HIT|MISS`)
//!
//! # Design Decisions
//! - `Content-Length` and `Content-Encoding` are dropped because bodies are
//!   decoded and possibly rewritten; the server recomputes framing
//! - The cache marker is added after storage, never stored

use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::security::headers::{is_framing_header, is_hop_by_hop};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Cache disposition of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(self) -> HeaderValue {
        match self {
            CacheStatus::Hit => HeaderValue::from_static("HIT"),
            CacheStatus::Miss => HeaderValue::from_static("MISS"),
        }
    }

    /// Metrics label.
    pub fn as_label(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

/// Add the CORS triplet and the permissive framing header.
pub fn apply_proxy_headers(headers: &mut HeaderMap) {
    let any = HeaderValue::from_static("*");
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, any.clone());
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, any.clone());
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, any);
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("ALLOWALL"));
}

/// Header set served to the browser for an upstream response.
pub fn outbound_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 4);
    for (name, value) in upstream {
        let lower = name.as_str();
        if is_framing_header(lower) || is_hop_by_hop(lower) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    apply_proxy_headers(&mut headers);
    headers
}

/// Assemble a response from parts.
pub fn build(
    status: StatusCode,
    mut headers: HeaderMap,
    cache: CacheStatus,
    body: Body,
) -> Response {
    headers.insert(X_CACHE, cache.as_header());
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Local answer to a CORS preflight.
pub fn preflight() -> Response {
    let mut headers = HeaderMap::new();
    apply_proxy_headers(&mut headers);
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    *response.headers_mut() = headers;
    response
}
