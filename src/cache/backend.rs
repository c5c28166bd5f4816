//! The storage contract every cache backend satisfies
//!
//! Callers hold an `Arc<dyn CacheBackend>` and never depend on a concrete
//! backend. Payloads are plain JSON values; typed access lives in
//! [`CacheManager`](super::CacheManager).

use std::fmt::Debug;
use std::time::Duration;

use serde_json::Value;

use super::error::Result;
use super::key::CacheKey;

pub trait CacheBackend: Send + Sync + Debug {
    /// Returns the payload stored under `key` if present and fresh
    ///
    /// With `ttl` set, an entry whose age is `ttl` or more is a miss. Without
    /// it, entries never expire. Misses, expired entries and unreadable
    /// entries all return `None`; this never fails.
    fn load(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<Value>;

    /// Stores `payload` under `key`, replacing any prior entry
    ///
    /// Either the new entry is fully written or the prior one is left intact.
    fn save(&self, key: &CacheKey, payload: &Value) -> Result<()>;

    /// Removes the entry for `key`. A missing entry is not an error.
    fn invalidate(&self, key: &CacheKey) -> Result<()>;

    /// Removes every entry owned by this backend
    fn clear_all(&self) -> Result<()>;

    /// Removes entries older than `max_age`, returning how many were removed
    ///
    /// Expiration is otherwise lazy; this is an explicit sweep for backends
    /// that can enumerate their entries.
    fn purge_expired(&self, max_age: Duration) -> Result<usize> {
        let _ = max_age;
        Ok(0)
    }
}
