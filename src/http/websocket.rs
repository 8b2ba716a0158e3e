//! WebSocket relay.
//!
//! # Responsibilities
//! - Decode the relay path into the real WebSocket target
//! - Refuse blocklisted hosts before the upgrade
//! - Establish the target connection within the connect timeout
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Browser ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Target
//! ```
//!
//! # Design Decisions
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Ping/pong forwarded like data frames
//! - A failed target connection closes the browser socket, no retry

use std::time::Duration;

use axum::extract::ws::{self, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::{HeaderValue, ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ProxyError;
use crate::http::error_page;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Wait this long for the second direction after the first one ended.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Close code sent to the browser when the target is unreachable.
const CLOSE_UNREACHABLE: u16 = 1011;

type TargetSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of one relay pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelayState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// The two sockets of one tunnel, tracked through their lifecycle.
#[derive(Debug)]
pub struct RelayPair {
    target: Url,
    state: RelayState,
}

impl RelayPair {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            state: RelayState::Connecting,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Move forward in the lifecycle; moving backwards is ignored.
    pub fn advance(&mut self, next: RelayState) {
        if next <= self.state {
            return;
        }
        tracing::debug!(target_url = %self.target, from = ?self.state, to = ?next, "Relay state");
        self.state = next;
    }
}

/// Upgrade handler for every path under the WebSocket prefix.
pub async fn websocket_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let home = &state.config.routes.home_path;
    let target = match state.rewriter.canonicalizer().decode_websocket(uri.path()) {
        Ok(target) => target,
        Err(err) => {
            tracing::warn!(path = %uri.path(), error = %err, "Invalid relay target");
            return error_page::render_with_home(&err, home);
        }
    };
    if let Err(err) = state.blocklist.check(&target) {
        tracing::info!(target_url = %target, "Refused blocklisted relay target");
        return error_page::render_with_home(&err, home);
    }

    let protocols: Vec<String> = headers
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let connect_timeout = state.config.upstream.connect_timeout();
    upgrade
        .protocols(protocols.clone())
        .on_upgrade(move |socket| relay(socket, target, protocols, connect_timeout))
        .into_response()
}

async fn connect_target(
    target: &Url,
    protocols: &[String],
    connect_timeout: Duration,
) -> Result<TargetSocket, ProxyError> {
    let establishment = |reason: String| ProxyError::RelayEstablishment {
        target: target.to_string(),
        reason,
    };

    let mut request = target
        .as_str()
        .into_client_request()
        .map_err(|e| establishment(e.to_string()))?;

    let origin = target.origin().ascii_serialization().replacen("ws", "http", 1);
    if let Ok(value) = HeaderValue::from_str(&origin) {
        request.headers_mut().insert(ORIGIN, value);
    }
    if !protocols.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&protocols.join(", ")) {
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }
    }

    match tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(establishment(e.to_string())),
        Err(_) => Err(establishment(format!(
            "connect timed out after {} seconds",
            connect_timeout.as_secs()
        ))),
    }
}

async fn relay(
    mut client: WebSocket,
    target: Url,
    protocols: Vec<String>,
    connect_timeout: Duration,
) {
    let mut pair = RelayPair::new(target.clone());

    let upstream = match connect_target(&target, &protocols, connect_timeout).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(target_url = %target, error = %err, "Relay establishment failed");
            let frame = ws::CloseFrame {
                code: CLOSE_UNREACHABLE,
                reason: Utf8Bytes::from_static("target unreachable"),
            };
            let _ = client.send(ws::Message::Close(Some(frame))).await;
            pair.advance(RelayState::Closed);
            return;
        }
    };

    pair.advance(RelayState::Open);
    metrics::record_relay_opened();

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(message) = client_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(error = %e, "Browser socket error");
                    break;
                }
            };
            let closing = matches!(message, ws::Message::Close(_));
            if upstream_tx.send(to_target(message)).await.is_err() {
                break;
            }
            metrics::record_relay_frame("client_to_target");
            if closing {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(message) = upstream_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(error = %e, "Target socket error");
                    break;
                }
            };
            let Some(message) = to_client(message) else {
                continue;
            };
            let closing = matches!(message, ws::Message::Close(_));
            if client_tx.send(message).await.is_err() {
                break;
            }
            metrics::record_relay_frame("target_to_client");
            if closing {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::pin!(client_to_upstream);
    tokio::pin!(upstream_to_client);

    tokio::select! {
        _ = &mut client_to_upstream => {
            pair.advance(RelayState::Closing);
            let _ = tokio::time::timeout(CLOSE_GRACE, &mut upstream_to_client).await;
        }
        _ = &mut upstream_to_client => {
            pair.advance(RelayState::Closing);
            let _ = tokio::time::timeout(CLOSE_GRACE, &mut client_to_upstream).await;
        }
    }

    pair.advance(RelayState::Closed);
    metrics::record_relay_closed();
}

/// Browser frame → target frame.
pub fn to_target(message: ws::Message) -> tungstenite::Message {
    match message {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().to_string().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|f| {
            tungstenite::protocol::CloseFrame {
                code: CloseCode::from(f.code),
                reason: f.reason.as_str().to_string().into(),
            }
        })),
    }
}

/// Target frame → browser frame. Raw frames are never surfaced by the
/// reader and are dropped.
pub fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    let message = match message {
        tungstenite::Message::Text(text) => {
            ws::Message::Text(Utf8Bytes::from(text.as_str().to_string()))
        }
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: Utf8Bytes::from(f.reason.as_str().to_string()),
        })),
        tungstenite::Message::Frame(_) => return None,
    };
    Some(message)
}
