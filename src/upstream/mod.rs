//! Upstream fetch subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest
//!     → browser.rs (allowlisted, browser-like header set)
//!     → transport.rs (Transport trait seam)
//!     → fetcher.rs (reqwest: timeout, redirects, decompression)
//!     → UpstreamResponse (status, final URL, headers, streaming body)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every fetch has a deadline
//! - No automatic retries; the browser re-issues the request
//! - Non-2xx is classified by the caller, the body stays available

pub mod browser;
pub mod fetcher;
pub mod transport;

pub use fetcher::HttpFetcher;
pub use transport::{Buffered, Transport, UpstreamBody, UpstreamRequest, UpstreamResponse};
