//! End-to-end proxy pipeline tests driven through the real router with an
//! in-process transport.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use rewrite_proxy::config::ProxyConfig;
use rewrite_proxy::http::HttpServer;

mod common;
use common::{proxy_path, test_config, MockResponse, StaticTransport};

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

async fn send(router: &Router, method: Method, uri: &str, body: Body) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, "session=proxy-origin")
        .header("x-forwarded-for", "10.1.2.3")
        .body(body)
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

async fn get(router: &Router, uri: &str) -> Reply {
    send(router, Method::GET, uri, Body::empty()).await
}

fn setup(config: ProxyConfig) -> (Router, Arc<StaticTransport>, HttpServer) {
    let transport = StaticTransport::new();
    let server = HttpServer::with_transport(config, transport.clone());
    (server.router(), transport, server)
}

const PAGE: &str = concat!(
    r#"<html><head><meta http-equiv="Content-Security-Policy" content="default-src 'none'">"#,
    r#"<title>Example</title></head>"#,
    r#"<body><a href="/about">About</a><img src="img/logo.png"></body></html>"#
);

#[tokio::test]
async fn test_html_is_rewritten_and_headers_shaped() {
    let (router, transport, _server) = setup(test_config());
    transport.respond(
        "https://example.com/",
        MockResponse::html(PAGE)
            .with_header("content-security-policy", "frame-ancestors 'none'")
            .with_header("x-frame-options", "DENY")
            .with_header("strict-transport-security", "max-age=31536000"),
    );

    let reply = get(&router, &proxy_path("https://example.com/")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains(r#"<a href="/proxy/https%3A%2F%2Fexample.com%2Fabout">"#));
    assert!(reply.body.contains(r#"src="/proxy/https%3A%2F%2Fexample.com%2Fimg%2Flogo.png""#));
    assert_eq!(reply.body.matches("data-proxy-hook").count(), 1);
    assert_eq!(reply.body.matches("<base ").count(), 1);
    assert!(!reply.body.contains("Content-Security-Policy"));

    assert!(reply.headers.get("content-security-policy").is_none());
    assert!(reply.headers.get("strict-transport-security").is_none());
    assert_eq!(reply.headers["x-frame-options"], "ALLOWALL");
    assert_eq!(reply.headers["access-control-allow-origin"], "*");
    assert_eq!(reply.headers["x-cache"], "MISS");
    assert!(reply.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upstream_request_looks_like_a_browser() {
    let (router, transport, _server) = setup(test_config());
    transport.respond("https://example.com/", MockResponse::html("<p>x</p>"));

    get(&router, &proxy_path("https://example.com/")).await;

    let request = transport.last_request().unwrap();
    assert!(request.headers.get("cookie").is_none());
    assert!(request.headers.get("x-forwarded-for").is_none());
    assert!(request.headers.get("host").is_none());
    assert_eq!(request.headers["referer"], "https://example.com/");
    assert!(request.headers["user-agent"].to_str().unwrap().contains("Chrome"));
}

#[tokio::test]
async fn test_cache_hit_within_ttl() {
    let (router, transport, _server) = setup(test_config());
    transport.respond("https://example.com/", MockResponse::html(PAGE));

    let first = get(&router, &proxy_path("https://example.com/")).await;
    let second = get(&router, &proxy_path("https://example.com/")).await;

    assert_eq!(first.headers["x-cache"], "MISS");
    assert_eq!(second.headers["x-cache"], "HIT");
    assert_eq!(first.body, second.body);
    assert_eq!(second.headers["x-frame-options"], "ALLOWALL");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_cache_expires_after_ttl() {
    let mut config = test_config();
    config.cache.ttl_secs = 1;
    let (router, transport, _server) = setup(config);
    transport.respond("https://example.com/", MockResponse::html(PAGE));

    get(&router, &proxy_path("https://example.com/")).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let reply = get(&router, &proxy_path("https://example.com/")).await;

    assert_eq!(reply.headers["x-cache"], "MISS");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_post_never_touches_cache() {
    let (router, transport, server) = setup(test_config());
    transport.respond("https://example.com/form", MockResponse::html("<p>done</p>"));
    let path = proxy_path("https://example.com/form");

    let post = send(&router, Method::POST, &path, Body::from("a=1")).await;
    assert_eq!(post.headers["x-cache"], "MISS");
    assert!(server.cache().is_empty());
    assert_eq!(transport.last_request().unwrap().body.as_ref(), b"a=1");

    let first_get = get(&router, &path).await;
    assert_eq!(first_get.headers["x-cache"], "MISS");
    let second_get = get(&router, &path).await;
    assert_eq!(second_get.headers["x-cache"], "HIT");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_query_distinguishes_entries_and_is_merged() {
    let (router, transport, _server) = setup(test_config());
    transport.respond("https://example.com/search?q=rust", MockResponse::html("<p>rust</p>"));
    transport.respond("https://example.com/search?q=go", MockResponse::html("<p>go</p>"));
    let path = proxy_path("https://example.com/search");

    let rust = get(&router, &format!("{}?q=rust", path)).await;
    let go = get(&router, &format!("{}?q=go", path)).await;

    assert!(rust.body.contains("<p>rust</p>"));
    assert!(go.body.contains("<p>go</p>"));
    assert_eq!(go.headers["x-cache"], "MISS");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_blocked_host_never_reaches_upstream() {
    let (router, transport, server) = setup(test_config());

    let reply = get(&router, &proxy_path("https://chat.openai.com/")).await;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(reply.body.contains("Site Blocked"));
    assert_eq!(transport.calls(), 0);
    assert_eq!(server.cache().stats().misses, 0);
}

#[tokio::test]
async fn test_bare_host_defaults_to_https() {
    let (router, transport, _server) = setup(test_config());
    transport.respond("https://example.com/", MockResponse::html("<p>bare</p>"));

    let reply = get(&router, "/proxy/example.com").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("<p>bare</p>"));
}

#[tokio::test]
async fn test_css_is_rewritten() {
    let (router, transport, _server) = setup(test_config());
    transport.respond(
        "https://example.com/style/site.css",
        MockResponse::new(
            200,
            "text/css",
            "body{background:url(img/a.png)} i{background:url(data:image/png;base64,AAAA)}",
        ),
    );

    let reply = get(&router, &proxy_path("https://example.com/style/site.css")).await;

    assert!(reply
        .body
        .contains(r#"url("/proxy/https%3A%2F%2Fexample.com%2Fstyle%2Fimg%2Fa.png")"#));
    assert!(reply.body.contains("url(data:image/png;base64,AAAA)"));
}

#[tokio::test]
async fn test_script_and_binary_pass_through() {
    let (router, transport, _server) = setup(test_config());
    let script = "fetch('/api/data').then(r => r.json())";
    transport.respond(
        "https://example.com/app.js",
        MockResponse::new(200, "application/javascript", script),
    );
    transport.respond(
        "https://example.com/logo.png",
        MockResponse::new(200, "image/png", vec![0x89, b'P', b'N', b'G', 0, 1, 2]),
    );

    let js = get(&router, &proxy_path("https://example.com/app.js")).await;
    assert_eq!(js.body, script);

    let request = Request::builder()
        .uri(proxy_path("https://example.com/logo.png"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &[0x89, b'P', b'N', b'G', 0, 1, 2]);
}

#[tokio::test]
async fn test_oversized_body_streams_uncached() {
    let mut config = test_config();
    config.cache.max_entry_bytes = 16;
    let (router, transport, server) = setup(config);
    let payload = vec![7u8; 1024];
    transport.respond(
        "https://example.com/big.bin",
        MockResponse::new(200, "application/octet-stream", payload.clone()),
    );

    let request = Request::builder()
        .uri(proxy_path("https://example.com/big.bin"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-cache"], "MISS");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    assert_eq!(bytes.as_ref(), payload.as_slice());
    assert!(server.cache().is_empty());
}

#[tokio::test]
async fn test_oversized_document_streams_unrewritten() {
    let mut config = test_config();
    config.upstream.max_rewrite_bytes = 64;
    let (router, transport, server) = setup(config);
    transport.respond("https://example.com/huge", MockResponse::html(PAGE));

    let reply = get(&router, &proxy_path("https://example.com/huge")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, PAGE);
    assert!(!reply.body.contains("data-proxy-hook"));
    assert_eq!(reply.headers["x-cache"], "MISS");
    assert!(server.cache().is_empty());
}

#[tokio::test]
async fn test_large_text_is_compressed_on_request() {
    let (router, transport, _server) = setup(test_config());
    let page = format!("<html><head></head><body>{}</body></html>", "<p>row</p>".repeat(400));
    transport.respond("https://example.com/long", MockResponse::html(&page));
    transport.respond("https://example.com/short", MockResponse::html("<p>tiny</p>"));
    transport.respond(
        "https://example.com/photo.jpg",
        MockResponse::new(200, "image/jpeg", vec![0xffu8; 4096]),
    );

    let gzip = |uri: String| {
        Request::builder()
            .uri(uri)
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap()
    };

    let long = router.clone().oneshot(gzip(proxy_path("https://example.com/long"))).await.unwrap();
    assert_eq!(long.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(long.headers()["x-cache"], "MISS");

    let short = router
        .clone()
        .oneshot(gzip(proxy_path("https://example.com/short")))
        .await
        .unwrap();
    assert!(short.headers().get(header::CONTENT_ENCODING).is_none());

    let photo = router
        .clone()
        .oneshot(gzip(proxy_path("https://example.com/photo.jpg")))
        .await
        .unwrap();
    assert!(photo.headers().get(header::CONTENT_ENCODING).is_none());

    let mut config = test_config();
    config.listener.compression = false;
    let (plain_router, plain_transport, _plain) = setup(config);
    plain_transport.respond("https://example.com/long", MockResponse::html(&page));
    let plain = plain_router.oneshot(gzip(proxy_path("https://example.com/long"))).await.unwrap();
    assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
}

#[tokio::test]
async fn test_upstream_error_page_is_relayed_uncached() {
    let (router, transport, server) = setup(test_config());
    transport.respond(
        "https://example.com/missing",
        MockResponse::new(
            404,
            "text/html",
            r#"<html><head></head><body><a href="/">home</a></body></html>"#,
        ),
    );

    let reply = get(&router, &proxy_path("https://example.com/missing")).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.contains(r#"href="/proxy/https%3A%2F%2Fexample.com%2F""#));
    assert!(server.cache().is_empty());

    get(&router, &proxy_path("https://example.com/missing")).await;
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_empty_upstream_error_becomes_error_page() {
    let (router, transport, _server) = setup(test_config());
    transport.respond("https://example.com/denied", MockResponse::new(403, "text/html", ""));

    let reply = get(&router, &proxy_path("https://example.com/denied")).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body.contains("Proxy Error"));
    assert!(reply.body.contains("Site is blocking proxy access (403 Forbidden)"));
}

#[tokio::test]
async fn test_unreachable_upstream_renders_error_page() {
    let (router, _transport, _server) = setup(test_config());

    let reply = get(&router, &proxy_path("https://nowhere.example/")).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body.contains("Failed to load site"));
    assert!(reply.body.contains(r#"href="/""#));
}

#[tokio::test]
async fn test_preflight_answered_locally() {
    let (router, transport, _server) = setup(test_config());

    let path = proxy_path("https://example.com/api");
    let reply = send(&router, Method::OPTIONS, &path, Body::empty()).await;

    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(reply.headers["access-control-allow-methods"], "*");
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (router, _transport, _server) = setup(test_config());
    let reply = get(&router, "/healthz").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "ok");
}

#[tokio::test]
async fn test_admin_api() {
    let mut config = test_config();
    config.admin.enabled = true;
    config.admin.api_key = "secret".to_string();
    let (router, transport, server) = setup(config);
    transport.respond("https://example.com/", MockResponse::html(PAGE));
    get(&router, &proxy_path("https://example.com/")).await;

    let unauthorized = get(&router, "/admin/cache").await;
    assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/admin/cache")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let stats: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(stats["entries"], 1);
    assert_eq!(stats["insertions"], 1);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/admin/cache")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.cache().is_empty());
}

#[tokio::test]
async fn test_admin_disabled_by_default() {
    let (router, _transport, _server) = setup(test_config());
    let reply = get(&router, "/admin/status").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
