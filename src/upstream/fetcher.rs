//! `reqwest`-backed transport.

use std::error::Error as _;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use reqwest::redirect::Policy;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::security::Blocklist;
use crate::upstream::transport::{Transport, UpstreamBody, UpstreamRequest, UpstreamResponse};

/// Default transport: one pooled HTTP client that follows redirects unless
/// the next hop is blocklisted.
///
/// The deadline covers the response head. Bodies are only guarded against
/// stalls here, so a long download keeps streaming after the headers went
/// out; callers that buffer a body bound it themselves.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &UpstreamConfig, blocklist: Blocklist) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.timeout())
            .redirect(redirect_policy(config.max_redirects, blocklist))
            .build()
            .map_err(|e| ProxyError::UpstreamUnreachable {
                reason: format!("client construction failed: {}", e),
            })?;

        tracing::debug!(
            timeout_secs = config.timeout_secs,
            max_redirects = config.max_redirects,
            "Upstream client ready"
        );

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }
}

fn redirect_policy(max_redirects: usize, blocklist: Blocklist) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(format!("more than {} redirects", max_redirects));
        }
        if blocklist.is_blocked(attempt.url()) {
            let host = attempt.url().host_str().unwrap_or_default().to_string();
            tracing::info!(host = %host, "Refused redirect to blocklisted host");
            return attempt.error(ProxyError::BlockedDomain { host });
        }
        attempt.follow()
    })
}

/// Map a client error onto the proxy taxonomy.
fn classify(err: reqwest::Error, timeout_secs: u64) -> ProxyError {
    if err.is_timeout() {
        return ProxyError::UpstreamTimeout { secs: timeout_secs };
    }

    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(ProxyError::BlockedDomain { host }) = cause.downcast_ref::<ProxyError>() {
            return ProxyError::BlockedDomain { host: host.clone() };
        }
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    ProxyError::UpstreamUnreachable { reason }
}

impl Transport for HttpFetcher {
    fn fetch(
        &self,
        request: UpstreamRequest,
    ) -> BoxFuture<'_, Result<UpstreamResponse, ProxyError>> {
        Box::pin(async move {
            let timeout_secs = self.timeout.as_secs();

            let mut builder = self
                .client
                .request(request.method, request.url)
                .headers(request.headers);
            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let response = tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| ProxyError::UpstreamTimeout { secs: timeout_secs })?
                .map_err(|e| classify(e, timeout_secs))?;

            let status = response.status();
            let url = response.url().clone();
            let headers = response.headers().clone();
            let body = response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| classify(e, timeout_secs)));

            Ok(UpstreamResponse {
                status,
                url,
                headers,
                body: UpstreamBody::from_stream(body),
            })
        })
    }
}
