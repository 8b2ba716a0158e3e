//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → blocklist.rs (refuse unproxyable hosts, no network I/O)
//!     → headers.rs (drop Host / X-Forwarded-* before forwarding)
//! Upstream response:
//!     → headers.rs (strip CSP / X-Frame-Options)
//! ```
//!
//! # Design Decisions
//! - Blocklist is checked before the cache and before the fetcher
//! - No content sanitization beyond framing headers

pub mod blocklist;
pub mod headers;

pub use blocklist::Blocklist;
