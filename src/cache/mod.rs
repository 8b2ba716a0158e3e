//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET request
//!     → key.rs (fingerprint = canonical URL + query)
//!     → store.rs get (HIT: replay headers + body)
//!     → on MISS: fetch + rewrite → store.rs put (LRU eviction)
//! ```
//!
//! # Design Decisions
//! - Only GET requests read or populate the cache
//! - Expiry is lazy; sweeper.rs optionally purges in the background
//! - Entries are inserted only after the whole body was rewritten
//! - Nothing is persisted across restarts

pub mod entry;
pub mod key;
pub mod store;
pub mod sweeper;

pub use entry::CacheEntry;
pub use key::Fingerprint;
pub use store::{CacheSettings, CacheStats, ResponseCache};
