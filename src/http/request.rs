//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every request
//! - Decode the path-embedded target and merge browser-added query parameters
//! - Buffer the inbound body for methods that carry one
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body size limit enforced while reading, not after

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use bytes::Bytes;
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::cache::Fingerprint;
use crate::canonical::Canonicalizer;
use crate::error::ProxyError;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// UUID v4 request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `-` when missing.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Append the browser-supplied query (e.g. a GET form submission) to the
/// decoded target.
pub fn merge_query(target: &mut Url, query: Option<&str>) {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return;
    };
    let merged = match target.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, query),
        _ => query.to_string(),
    };
    target.set_query(Some(&merged));
}

/// A decoded inbound proxy request.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    /// Canonical absolute target URL.
    pub target: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: String,
}

impl ProxyRequest {
    /// Decode the target from the request path. The body is not read.
    pub fn target_of<B>(
        canonicalizer: &Canonicalizer,
        request: &Request<B>,
    ) -> Result<Url, ProxyError> {
        let mut target = canonicalizer.decode(request.uri().path())?;
        merge_query(&mut target, request.uri().query());
        Ok(target)
    }

    /// Build from an inbound request whose target was already decoded.
    pub async fn from_request(
        target: Url,
        request: Request<Body>,
        max_body_bytes: usize,
    ) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();
        let request_id = request_id(&parts.headers).to_string();

        let body = if parts.method == Method::GET || parts.method == Method::HEAD {
            Bytes::new()
        } else {
            axum::body::to_bytes(body, max_body_bytes)
                .await
                .map_err(|e| ProxyError::Body(e.to_string()))?
        };

        Ok(Self {
            method: parts.method,
            target,
            headers: parts.headers,
            body,
            request_id,
        })
    }

    /// Only GET consults or populates the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.target)
    }
}
