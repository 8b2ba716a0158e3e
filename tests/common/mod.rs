//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use rewrite_proxy::canonical::encode_component;
use rewrite_proxy::config::ProxyConfig;
use rewrite_proxy::error::ProxyError;
use rewrite_proxy::http::HttpServer;
use rewrite_proxy::lifecycle::Shutdown;
use rewrite_proxy::upstream::{Transport, UpstreamBody, UpstreamRequest, UpstreamResponse};

/// Proxy path for `url` under the default prefix.
pub fn proxy_path(url: &str) -> String {
    format!("/proxy/{}", encode_component(url))
}

/// Relay path for `url` under the default WebSocket prefix.
pub fn relay_path(url: &str) -> String {
    format!("/ws/{}", encode_component(url))
}

/// Canned upstream answer.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
    pub headers: Vec<(&'static str, String)>,
    pub delay: Option<Duration>,
    /// Write the body in chunks of this size, pausing between them.
    pub trickle: Option<(usize, Duration)>,
}

impl MockResponse {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            headers: Vec::new(),
            delay: None,
            trickle: None,
        }
    }

    pub fn html(body: &str) -> Self {
        Self::new(200, "text/html; charset=utf-8", body.to_string())
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_trickle(mut self, chunk: usize, pause: Duration) -> Self {
        self.trickle = Some((chunk, pause));
        self
    }
}

/// In-process transport answering from a table keyed by URL. Records every
/// request so tests can assert on what would have hit the network.
#[derive(Default)]
pub struct StaticTransport {
    responses: Mutex<HashMap<String, MockResponse>>,
    requests: Mutex<Vec<UpstreamRequest>>,
    calls: AtomicUsize,
}

impl StaticTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, response: MockResponse) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<UpstreamRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Transport for StaticTransport {
    fn fetch(
        &self,
        request: UpstreamRequest,
    ) -> BoxFuture<'_, Result<UpstreamResponse, ProxyError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);

            let mock = self
                .responses
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ProxyError::UpstreamUnreachable {
                    reason: format!("no mock for {}", url),
                })?;

            let mut headers = HeaderMap::new();
            headers.insert("content-type", HeaderValue::from_static(mock.content_type));
            for (name, value) in &mock.headers {
                headers.append(*name, HeaderValue::from_str(value).unwrap());
            }

            Ok(UpstreamResponse {
                status: StatusCode::from_u16(mock.status).unwrap(),
                url,
                headers,
                body: UpstreamBody::from_bytes(mock.body),
            })
        })
    }
}

/// Start a raw HTTP/1.1 site on an ephemeral port. The handler receives the
/// request path and returns the canned answer. Returns the bound address and
/// a counter of served requests.
pub async fn start_site<F>(handler: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&buf).to_string();
                let path = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                counter.fetch_add(1, Ordering::SeqCst);
                let mock = handler(&path);
                if let Some(delay) = mock.delay {
                    tokio::time::sleep(delay).await;
                }

                let reason = StatusCode::from_u16(mock.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let mut head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: {}\r\n\
                     Content-Length: {}\r\nConnection: close\r\n",
                    mock.status,
                    reason,
                    mock.content_type,
                    mock.body.len()
                );
                for (name, value) in &mock.headers {
                    head.push_str(&format!("{}: {}\r\n", name, value));
                }
                head.push_str("\r\n");

                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                match mock.trickle {
                    Some((size, pause)) => {
                        for chunk in mock.body.chunks(size) {
                            if socket.write_all(chunk).await.is_err() {
                                return;
                            }
                            let _ = socket.flush().await;
                            tokio::time::sleep(pause).await;
                        }
                    }
                    None => {
                        let _ = socket.write_all(&mock.body).await;
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, served)
}

/// Start a WebSocket echo server. A text message `close-me` makes the
/// server close the connection with code 1000 and reason `bye`. The
/// receiver yields once per connection when the server side has ended.
pub async fn start_echo_server() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (ended_tx, ended_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let ended = ended_tx.clone();
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = socket.next().await {
                    let close_requested =
                        matches!(&message, Message::Text(text) if text.as_str() == "close-me");
                    if close_requested {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: Utf8Bytes::from_static("bye"),
                        };
                        let _ = socket.close(Some(frame)).await;
                        break;
                    }
                    match message {
                        Message::Text(_) | Message::Binary(_) => {
                            if socket.send(message).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = ended.send(());
            });
        }
    });

    (addr, ended_rx)
}

/// Bind the proxy on an ephemeral port and serve it in the background.
pub async fn spawn_proxy(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    (addr, shutdown)
}

/// Default configuration with the background sweeper disabled.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.cache.sweep_interval_secs = 0;
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
