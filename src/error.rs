//! Proxy error taxonomy.
//!
//! Every failure that aborts a proxied request is a [`ProxyError`]. The
//! handler turns it into the fixed error page via [`IntoResponse`]; an
//! `InvalidUrl` on a single embedded reference never gets this far because
//! the rewriter keeps the original reference instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use thiserror::Error;

use crate::http::error_page;

/// Errors that can occur while proxying a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Host matched the blocklist; no network call was attempted.
    #[error("domain {host} cannot be proxied")]
    BlockedDomain { host: String },

    /// Reference does not resolve to a valid absolute URL.
    #[error("invalid URL: {reference}")]
    InvalidUrl { reference: String },

    /// Upstream fetch exceeded its deadline.
    #[error("upstream timed out after {secs} seconds")]
    UpstreamTimeout { secs: u64 },

    /// Upstream answered with a non-2xx status.
    #[error("HTTP {}: {}", .status.as_u16(), .status.canonical_reason().unwrap_or("Unknown"))]
    UpstreamHttp { status: StatusCode, body: Bytes },

    /// DNS, connection or protocol failure talking to the upstream.
    #[error("upstream unreachable: {reason}")]
    UpstreamUnreachable { reason: String },

    /// The WebSocket target could not be reached.
    #[error("websocket relay to {target} failed: {reason}")]
    RelayEstablishment { target: String, reason: String },

    /// The HTML rewriter rejected the document.
    #[error("rewrite failed: {0}")]
    Rewrite(String),

    /// The inbound request body could not be read.
    #[error("request body error: {0}")]
    Body(String),
}

impl ProxyError {
    /// Status code of the error page for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BlockedDomain { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::BlockedDomain { .. } => "blocked_domain",
            ProxyError::InvalidUrl { .. } => "invalid_url",
            ProxyError::UpstreamTimeout { .. } => "upstream_timeout",
            ProxyError::UpstreamHttp { .. } => "upstream_http",
            ProxyError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ProxyError::RelayEstablishment { .. } => "relay_establishment",
            ProxyError::Rewrite(_) => "rewrite",
            ProxyError::Body(_) => "body",
        }
    }

    /// Human-readable explanation shown on the error page.
    pub fn user_message(&self) -> String {
        match self {
            ProxyError::BlockedDomain { .. } => {
                "Sites like ChatGPT, Claude, and streaming services have protection \
                 against proxies."
                    .to_string()
            }
            ProxyError::UpstreamTimeout { .. } => {
                "Request timed out - site took too long to respond".to_string()
            }
            ProxyError::UpstreamHttp { status, .. } if *status == StatusCode::FORBIDDEN => {
                "Site is blocking proxy access (403 Forbidden)".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_page::render(&self)
    }
}
