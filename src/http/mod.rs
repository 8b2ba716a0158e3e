//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (decode target, merge query, read body)
//!     → proxy.rs (blocklist → cache → upstream → rewrite → cache)
//!     → response.rs (header shaping, CORS, X-Cache)
//!     → Send to client
//!
//! Upgrade requests under the relay prefix
//!     → websocket.rs (decode target → blocklist → relay pair)
//! ```

pub mod error_page;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{MakeRequestUuid, ProxyRequest, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
