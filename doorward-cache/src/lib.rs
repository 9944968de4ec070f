//! TTL cache for Doorward.
//!
//! Generic in-memory cache with per-entry expiration, checked lazily on read.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod clock;

pub use cache::{CacheStats, TtlCache};
pub use clock::{ManualClock, MonotonicClock, TimeSource};
