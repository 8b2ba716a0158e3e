//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy, relay, health and admin routes
//! - Wire up middleware (request ID, tracing, response compression)
//! - Own the shared services (cache, blocklist, rewriter, transport)
//! - Run the cache sweeper alongside the listener
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::cache::sweeper::CacheSweeper;
use crate::cache::ResponseCache;
use crate::canonical::Canonicalizer;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::proxy::proxy_handler;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::http::websocket::websocket_handler;
use crate::rewrite::Rewriter;
use crate::security::Blocklist;
use crate::upstream::{HttpFetcher, Transport};

const COMPRESSION_MIN_BYTES: u16 = 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub rewriter: Arc<Rewriter>,
    pub blocklist: Arc<Blocklist>,
    pub cache: Arc<ResponseCache>,
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(config: ProxyConfig, transport: Arc<dyn Transport>) -> Self {
        let canonicalizer = Canonicalizer::from_config(&config.routes);
        Self {
            rewriter: Arc::new(Rewriter::new(canonicalizer)),
            blocklist: Arc::new(Blocklist::from_config(&config.blocklist)),
            cache: Arc::new(ResponseCache::from_config(&config.cache)),
            transport,
            config: Arc::new(config),
        }
    }
}

/// Compress text-like bodies from `COMPRESSION_MIN_BYTES` up. Media is
/// already compressed and upgrade responses carry no body.
fn compression_predicate() -> impl Predicate {
    SizeAbove::new(COMPRESSION_MIN_BYTES)
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("video/"))
        .and(NotForContentType::const_new("audio/"))
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server using the default `reqwest` transport.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let blocklist = Blocklist::from_config(&config.blocklist);
        let transport = Arc::new(HttpFetcher::new(&config.upstream, blocklist)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a server with a custom upstream transport.
    pub fn with_transport(config: ProxyConfig, transport: Arc<dyn Transport>) -> Self {
        let state = AppState::new(config, transport);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let routes = &state.config.routes;
        let proxy_route = format!("{}{{*target}}", routes.proxy_prefix);
        let websocket_route = format!("{}{{*target}}", routes.websocket_prefix);

        let mut router = Router::new()
            .route(&proxy_route, any(proxy_handler))
            .route(&websocket_route, get(websocket_handler))
            .route("/healthz", get(|| async { "ok" }));

        if state.config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        let compression = state.config.listener.compression;
        let mut router = router.with_state(state);
        if compression {
            router = router.layer(CompressionLayer::new().compress_when(compression_predicate()));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// The fully layered router, e.g. for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        self.state.cache.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = &self.state.config;
        tracing::info!(
            address = %addr,
            proxy_prefix = %config.routes.proxy_prefix,
            websocket_prefix = %config.routes.websocket_prefix,
            cache_enabled = config.cache.enabled,
            blocklist_entries = self.state.blocklist.len(),
            "HTTP server starting"
        );

        if config.cache.enabled && config.cache.sweep_interval_secs > 0 {
            let sweeper = CacheSweeper::new(
                self.state.cache.clone(),
                Duration::from_secs(config.cache.sweep_interval_secs),
            );
            let sweeper_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                sweeper.run(sweeper_shutdown).await;
            });
        }

        let mut shutdown = shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
