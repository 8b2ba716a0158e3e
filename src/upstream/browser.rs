//! Browser-representative request headers.
//!
//! Targets frequently reject traffic that does not look like a browser, so
//! the upstream request carries a realistic header set. Only an allowlist of
//! inbound headers is forwarded; everything identifying the proxy is dropped.
//! `Accept-Encoding` is left to the HTTP client, which then decodes
//! gzip/brotli/deflate bodies transparently.

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method};
use url::Url;

use crate::config::UpstreamConfig;

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// `Sec-Fetch-*` defaults for a top-level navigation.
const SEC_FETCH_DEFAULTS: [(&str, &str); 4] = [
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
];

fn forwarded_or(inbound: &HeaderMap, name: &HeaderName, default: &str) -> Option<HeaderValue> {
    inbound
        .get(name)
        .cloned()
        .or_else(|| HeaderValue::from_str(default).ok())
}

/// Build the outbound header set for a request to `target`.
pub fn browser_headers(
    inbound: &HeaderMap,
    target: &Url,
    method: &Method,
    has_body: bool,
    config: &UpstreamConfig,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(v) = forwarded_or(inbound, &header::USER_AGENT, &config.user_agent) {
        headers.insert(header::USER_AGENT, v);
    }
    if let Some(v) = forwarded_or(inbound, &header::ACCEPT, DEFAULT_ACCEPT) {
        headers.insert(header::ACCEPT, v);
    }
    if let Some(v) = forwarded_or(inbound, &header::ACCEPT_LANGUAGE, &config.accept_language) {
        headers.insert(header::ACCEPT_LANGUAGE, v);
    }

    for (name, default) in SEC_FETCH_DEFAULTS {
        let name = HeaderName::from_static(name);
        if let Some(v) = forwarded_or(inbound, &name, default) {
            headers.insert(name, v);
        }
    }

    let origin = target.origin().ascii_serialization();
    if let Ok(v) = HeaderValue::from_str(&format!("{}/", origin)) {
        headers.insert(header::REFERER, v);
    }
    if *method != Method::GET && *method != Method::HEAD {
        if let Ok(v) = HeaderValue::from_str(&origin) {
            headers.insert(header::ORIGIN, v);
        }
    }

    headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );

    if has_body {
        if let Some(v) = inbound.get(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, v.clone());
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("https://example.com/some/page?x=1").unwrap()
    }

    #[test]
    fn test_defaults_when_inbound_is_empty() {
        let headers = browser_headers(
            &HeaderMap::new(),
            &target(),
            &Method::GET,
            false,
            &UpstreamConfig::default(),
        );
        assert!(headers[header::USER_AGENT].to_str().unwrap().contains("Mozilla/5.0"));
        assert_eq!(headers[header::ACCEPT_LANGUAGE], "en-US,en;q=0.9");
        assert_eq!(headers[header::REFERER], "https://example.com/");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
        assert_eq!(headers["sec-fetch-dest"], "document");
        assert!(headers.get(header::ORIGIN).is_none());
        assert!(headers.get(header::ACCEPT_ENCODING).is_none());
    }

    #[test]
    fn test_never_forwards_proxy_identity() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("proxy.local:3000"));
        inbound.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        inbound.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        inbound.insert("x-forwarded-host", HeaderValue::from_static("proxy.local"));
        inbound.insert(header::COOKIE, HeaderValue::from_static("sid=proxy"));
        inbound.insert(header::USER_AGENT, HeaderValue::from_static("RealBrowser/1.0"));
        inbound.insert("sec-fetch-dest", HeaderValue::from_static("image"));

        let config = UpstreamConfig::default();
        let headers = browser_headers(&inbound, &target(), &Method::GET, false, &config);
        for name in ["host", "x-forwarded-for", "x-forwarded-proto", "x-forwarded-host", "cookie"] {
            assert!(headers.get(name).is_none(), "{name} leaked");
        }
        assert_eq!(headers[header::USER_AGENT], "RealBrowser/1.0");
        assert_eq!(headers["sec-fetch-dest"], "image");
    }

    #[test]
    fn test_post_carries_origin_and_content_type() {
        let mut inbound = HeaderMap::new();
        inbound.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let config = UpstreamConfig::default();
        let headers = browser_headers(&inbound, &target(), &Method::POST, true, &config);
        assert_eq!(headers[header::ORIGIN], "https://example.com");
        assert_eq!(headers[header::CONTENT_TYPE], "application/x-www-form-urlencoded");
    }
}
