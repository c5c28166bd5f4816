//! Typed facade over a cache backend
//!
//! `CacheManager` is what API clients hold. It picks a backend from
//! [`CacheSettings`], applies the configured default TTL, converts payloads
//! to and from concrete types, and implements the load-or-fetch-and-save
//! pattern in [`CacheManager::get_or_fetch`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::backend::CacheBackend;
use super::error::{CacheError, Result};
use super::file::FileCacheBackend;
use super::key::CacheKey;
use super::memory::MemoryCacheBackend;
use super::null::NullCacheBackend;
use crate::config::{BackendKind, CacheSettings};

/// Shared handle to a cache backend; cheap to clone
#[derive(Debug, Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Option<Duration>,
}

impl CacheManager {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            default_ttl: None,
        }
    }

    /// A manager that never caches anything
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullCacheBackend))
    }

    /// Sets the TTL used when a caller passes `None`
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Builds the backend described by `settings`
    ///
    /// Fails with [`CacheError::Configuration`] if the file backend has no
    /// usable storage root.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        let backend: Arc<dyn CacheBackend> = match settings.backend {
            BackendKind::File => {
                let dir = settings.cache_dir().ok_or_else(|| {
                    CacheError::configuration(
                        Path::new("<unset>"),
                        "no cache directory configured and no home directory found",
                    )
                })?;
                Arc::new(FileCacheBackend::open(dir)?)
            }
            BackendKind::Memory => Arc::new(MemoryCacheBackend::new()),
            BackendKind::Disabled => Arc::new(NullCacheBackend),
        };

        tracing::info!(
            backend = settings.backend.as_str(),
            default_ttl_secs = settings.default_ttl.map(|ttl| ttl.as_secs()),
            "initialized cache"
        );
        Ok(Self::new(backend).with_default_ttl(settings.default_ttl))
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Loads the raw payload; `ttl` of `None` falls back to the default TTL
    pub fn load_value(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<Value> {
        self.backend.load(key, ttl.or(self.default_ttl))
    }

    /// Loads and deserializes a payload
    ///
    /// A payload that does not fit `T` is logged and treated as a miss.
    pub fn load<T: DeserializeOwned>(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<T> {
        let value = self.load_value(key, ttl)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached payload has unexpected shape");
                None
            }
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &CacheKey, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.backend.save(key, &value)
    }

    pub fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.backend.invalidate(key)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.backend.clear_all()
    }

    pub fn purge_expired(&self, max_age: Duration) -> Result<usize> {
        self.backend.purge_expired(max_age)
    }

    /// Returns the cached value for `key`, or fetches, caches and returns it
    ///
    /// Errors from `fetch` are returned unchanged and nothing is cached.
    /// Failing to save a fetched value is logged and otherwise ignored, since
    /// the caller already has the data it asked for.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.load(key, ttl) {
            return Ok(cached);
        }

        let fresh = fetch().await?;
        if let Err(e) = self.save(key, &fresh) {
            tracing::warn!(key = %key, error = %e, "failed to cache fetched value");
        }
        Ok(fresh)
    }
}
