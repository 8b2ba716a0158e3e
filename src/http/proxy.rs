//! Proxy request pipeline.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → decode target (+ browser query)  → InvalidUrl   → error page
//!     → blocklist                         → Blocked     → 403 page
//!     → OPTIONS                           → 204 preflight
//!     → cache lookup (GET)                → HIT         → stored response
//!     → upstream fetch                    → Timeout/... → 500 page
//!     → buffer body (capped, deadline)    → oversized   → streamed as is
//!     → rewrite by content type
//!     → cache store (GET, 2xx, under ceiling)
//!     → X-Cache: MISS
//! ```

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::response::Response;
use tokio::time::timeout_at;

use crate::cache::CacheEntry;
use crate::error::ProxyError;
use crate::http::error_page;
use crate::http::request::{request_id, ProxyRequest};
use crate::http::response::{self, CacheStatus};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::rewrite::ContentKind;
use crate::upstream::browser::browser_headers;
use crate::upstream::{Buffered, UpstreamRequest};

/// Entry point for every path under the proxy prefix.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let id = request_id(request.headers()).to_string();

    match handle(&state, request).await {
        Ok((response, label)) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), label, start);
            response
        }
        Err(err) => {
            match &err {
                ProxyError::BlockedDomain { host } => {
                    tracing::info!(request_id = %id, host = %host, "Refused blocklisted host")
                }
                other => {
                    tracing::warn!(
                        request_id = %id,
                        kind = other.kind(),
                        error = %other,
                        "Proxy request failed"
                    )
                }
            }
            let response = error_page::render_with_home(&err, &state.config.routes.home_path);
            metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
            response
        }
    }
}

async fn handle(
    state: &AppState,
    request: Request<Body>,
) -> Result<(Response, &'static str), ProxyError> {
    let target = ProxyRequest::target_of(state.rewriter.canonicalizer(), &request)?;
    state.blocklist.check(&target)?;

    if request.method() == Method::OPTIONS {
        return Ok((response::preflight(), "none"));
    }

    let max_body_bytes = state.config.listener.max_body_bytes;
    let request = ProxyRequest::from_request(target, request, max_body_bytes).await?;
    let cacheable = request.is_cacheable() && state.cache.is_enabled();
    let fingerprint = request.fingerprint();

    tracing::debug!(
        request_id = %request.request_id,
        method = %request.method,
        target = %request.target,
        "Proxying request"
    );

    if cacheable {
        if let Some(entry) = state.cache.get(&fingerprint) {
            tracing::debug!(
                request_id = %request.request_id,
                fingerprint = %fingerprint,
                "Cache hit"
            );
            let response = response::build(
                entry.status,
                entry.headers.clone(),
                CacheStatus::Hit,
                Body::from(entry.body.clone()),
            );
            return Ok((response, CacheStatus::Hit.as_label()));
        }
    }

    let headers = browser_headers(
        &request.headers,
        &request.target,
        &request.method,
        !request.body.is_empty(),
        &state.config.upstream,
    );
    let upstream_config = &state.config.upstream;
    let deadline = Instant::now() + upstream_config.timeout();
    let upstream = state
        .transport
        .fetch(UpstreamRequest {
            method: request.method.clone(),
            url: request.target.clone(),
            headers,
            body: request.body.clone(),
        })
        .await?;

    let status = upstream.status;
    let base = upstream.url.clone();
    let kind = ContentKind::from_content_type(&upstream.content_type());
    let headers = response::outbound_headers(&upstream.headers);

    // Rewritten kinds and error pages are buffered up to the rewrite ceiling,
    // everything else up to the cache ceiling. Past the ceiling the body is
    // relayed as it arrives, unrewritten and uncached.
    let ceiling = if kind.is_rewritten() || !status.is_success() {
        upstream_config.max_rewrite_bytes
    } else {
        state.cache.settings().max_entry_bytes
    };
    let buffered = timeout_at(deadline.into(), upstream.body.buffer_up_to(ceiling))
        .await
        .map_err(|_| ProxyError::UpstreamTimeout {
            secs: upstream_config.timeout_secs,
        })??;

    let body = match buffered {
        Buffered::Complete(body) => body,
        Buffered::Overflow(stream) => {
            tracing::debug!(
                request_id = %request.request_id,
                target = %request.target,
                kind = kind.as_str(),
                ceiling,
                "Streaming oversized body uncached"
            );
            let body = Body::from_stream(stream.into_stream());
            let response = response::build(status, headers, CacheStatus::Miss, body);
            return Ok((response, CacheStatus::Miss.as_label()));
        }
    };

    if !status.is_success() && body.is_empty() {
        return Err(ProxyError::UpstreamHttp { status, body });
    }

    let body = if kind.is_rewritten() {
        let outcome = state.rewriter.rewrite(kind, body, &base)?;
        tracing::debug!(
            request_id = %request.request_id,
            kind = kind.as_str(),
            rewritten = outcome.rewritten,
            skipped = outcome.skipped,
            "Rewrote response body"
        );
        outcome.body
    } else {
        body
    };

    if !status.is_success() {
        tracing::debug!(
            request_id = %request.request_id,
            status = %status,
            "Relaying upstream error page"
        );
        let response = response::build(status, headers, CacheStatus::Miss, Body::from(body));
        return Ok((response, CacheStatus::Miss.as_label()));
    }

    if cacheable {
        state
            .cache
            .put(fingerprint, CacheEntry::new(status, headers.clone(), body.clone()));
    }

    let response = response::build(status, headers, CacheStatus::Miss, Body::from(body));
    Ok((response, CacheStatus::Miss.as_label()))
}
