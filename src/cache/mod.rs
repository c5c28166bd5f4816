//! Cache module for storing API responses
//!
//! Expensive calls to Slack, Jira and Workday are wrapped in a
//! load-or-fetch-and-save cycle so that reports can be regenerated without
//! hitting the APIs again. Storage is pluggable behind [`CacheBackend`]:
//!
//! - [`FileCacheBackend`] keeps one JSON envelope per key on disk
//! - [`MemoryCacheBackend`] keeps entries in process memory
//! - [`NullCacheBackend`] disables caching
//!
//! Expiration is decided at read time from the TTL the caller passes. Read
//! faults are downgraded to misses; write faults are returned as
//! [`CacheError`].

mod backend;
mod clock;
mod entry;
mod error;
mod file;
mod key;
mod manager;
mod memory;
mod null;
mod observer;

pub use backend::CacheBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{EntryFormat, Envelope, MAX_PAYLOAD_DEPTH};
pub use error::{CacheError, Result};
pub use file::FileCacheBackend;
pub use key::CacheKey;
pub use manager::CacheManager;
pub use memory::MemoryCacheBackend;
pub use null::NullCacheBackend;
pub use observer::{CacheEvent, CacheObserver, TracingObserver};
