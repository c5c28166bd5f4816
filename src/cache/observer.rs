//! Cache event reporting
//!
//! Backends report what they did through an injected [`CacheObserver`]
//! instead of a global logger. [`TracingObserver`] is the default and logs
//! through `tracing`.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

/// Something a backend did or noticed
#[derive(Debug, Clone, Copy)]
pub enum CacheEvent<'a> {
    Hit { key: &'a str },
    Miss { key: &'a str },
    Expired { key: &'a str, age: Duration },
    /// An entry exists but could not be read; it was treated as a miss
    Corrupt {
        key: &'a str,
        path: &'a Path,
        reason: &'a str,
    },
    Stored { key: &'a str },
    Invalidated { key: &'a str, existed: bool },
    Cleared { removed: usize },
    Purged { removed: usize },
}

/// Receives cache events from a backend
pub trait CacheObserver: Send + Sync + Debug {
    fn on_event(&self, event: &CacheEvent<'_>);
}

/// Logs every event with `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, event: &CacheEvent<'_>) {
        match *event {
            CacheEvent::Hit { key } => tracing::debug!(key, "cache hit"),
            CacheEvent::Miss { key } => tracing::debug!(key, "cache miss"),
            CacheEvent::Expired { key, age } => {
                tracing::debug!(key, age_secs = age.as_secs(), "cache entry expired")
            }
            CacheEvent::Corrupt { key, path, reason } => tracing::warn!(
                key,
                path = %path.display(),
                error = reason,
                "ignoring unreadable cache entry"
            ),
            CacheEvent::Stored { key } => tracing::debug!(key, "cache entry stored"),
            CacheEvent::Invalidated { key, existed } => {
                tracing::debug!(key, existed, "cache entry invalidated")
            }
            CacheEvent::Cleared { removed } => tracing::info!(removed, "cache cleared"),
            CacheEvent::Purged { removed } => tracing::info!(removed, "expired cache entries purged"),
        }
    }
}
