//! Rewriting web proxy library.

// Core subsystems
pub mod canonical;
pub mod config;
pub mod http;
pub mod rewrite;
pub mod upstream;

// Proxy services
pub mod cache;
pub mod hook;

// Cross-cutting concerns
pub mod admin;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
