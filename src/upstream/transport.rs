//! Upstream transport seam.
//!
//! The proxy core never talks to `reqwest` directly; it goes through
//! [`Transport`] so an alternative transport (or a test double) can perform
//! the raw fetch.

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use std::fmt;
use url::Url;

use crate::error::ProxyError;

/// A request as it will be sent to the target origin.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    /// Already filtered, browser-like header set.
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response head plus a streaming body.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// URL after redirects; the rewrite base.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    /// Declared content type, lowercased, or empty.
    pub fn content_type(&self) -> String {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase()
    }
}

/// Streaming upstream body.
pub struct UpstreamBody {
    stream: BoxStream<'static, Result<Bytes, ProxyError>>,
}

/// Result of buffering a body up to a ceiling.
pub enum Buffered {
    /// The whole body fit under the ceiling.
    Complete(Bytes),
    /// The ceiling was crossed; the body replays the buffered prefix first.
    Overflow(UpstreamBody),
}

impl UpstreamBody {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ProxyError>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::from_stream(stream::iter(std::iter::once(Ok(bytes))))
    }

    /// Read the whole body into memory.
    pub async fn collect(mut self) -> Result<Bytes, ProxyError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Buffer at most `limit` bytes. Larger bodies are handed back as a
    /// stream so they can be relayed without holding them in memory.
    pub async fn buffer_up_to(mut self, limit: usize) -> Result<Buffered, ProxyError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.stream.next().await {
            buf.extend_from_slice(&chunk?);
            if buf.len() > limit {
                let prefix = stream::iter(std::iter::once(Ok(buf.freeze())));
                return Ok(Buffered::Overflow(Self::from_stream(prefix.chain(self.stream))));
            }
        }
        Ok(Buffered::Complete(buf.freeze()))
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, ProxyError>> {
        self.stream
    }
}

impl fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamBody").finish_non_exhaustive()
    }
}

/// Performs raw fetches against target origins.
pub trait Transport: Send + Sync {
    fn fetch(
        &self,
        request: UpstreamRequest,
    ) -> BoxFuture<'_, Result<UpstreamResponse, ProxyError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(parts: &[&'static str]) -> UpstreamBody {
        let chunks: Vec<Result<Bytes, ProxyError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        UpstreamBody::from_stream(stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_collect() {
        let body = chunked(&["ab", "cd", "e"]).collect().await.unwrap();
        assert_eq!(body, Bytes::from_static(b"abcde"));
    }

    #[tokio::test]
    async fn test_buffer_under_limit() {
        match chunked(&["ab", "cd"]).buffer_up_to(4).await.unwrap() {
            Buffered::Complete(bytes) => assert_eq!(bytes, Bytes::from_static(b"abcd")),
            Buffered::Overflow(_) => panic!("should fit"),
        }
    }

    #[tokio::test]
    async fn test_overflow_replays_prefix() {
        match chunked(&["ab", "cd", "ef", "gh"]).buffer_up_to(3).await.unwrap() {
            Buffered::Overflow(rest) => {
                assert_eq!(rest.collect().await.unwrap(), Bytes::from_static(b"abcdefgh"));
            }
            Buffered::Complete(_) => panic!("should overflow"),
        }
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let chunks: Vec<Result<Bytes, ProxyError>> = vec![
            Ok(Bytes::from_static(b"ok")),
            Err(ProxyError::UpstreamTimeout { secs: 1 }),
        ];
        let err = UpstreamBody::from_stream(stream::iter(chunks)).collect().await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamTimeout { secs: 1 }));
    }
}
