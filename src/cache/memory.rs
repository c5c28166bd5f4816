//! In-process cache backend
//!
//! Holds envelopes in a map behind a `RwLock`. Nothing survives the process,
//! which makes it a fit for tests and one-off runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;

use super::backend::CacheBackend;
use super::clock::{Clock, SystemClock};
use super::entry::Envelope;
use super::error::Result;
use super::key::CacheKey;
use super::observer::{CacheEvent, CacheObserver, TracingObserver};

#[derive(Debug)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, Envelope>>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Every write leaves the map consistent, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Envelope>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Envelope>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn load(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<Value> {
        let entries = self.read();
        let Some(envelope) = entries.get(key.as_str()) else {
            self.observer.on_event(&CacheEvent::Miss { key: key.as_str() });
            return None;
        };

        let now = self.clock.now();
        if !envelope.is_fresh(now, ttl) {
            self.observer.on_event(&CacheEvent::Expired {
                key: key.as_str(),
                age: envelope.age(now).unwrap_or_default(),
            });
            return None;
        }

        self.observer.on_event(&CacheEvent::Hit { key: key.as_str() });
        Some(envelope.payload.clone())
    }

    fn save(&self, key: &CacheKey, payload: &Value) -> Result<()> {
        let envelope = Envelope::new(key.as_str(), self.clock.now(), payload.clone());
        self.write().insert(key.as_str().to_string(), envelope);
        self.observer.on_event(&CacheEvent::Stored { key: key.as_str() });
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let existed = self.write().remove(key.as_str()).is_some();
        self.observer.on_event(&CacheEvent::Invalidated {
            key: key.as_str(),
            existed,
        });
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let removed = {
            let mut entries = self.write();
            let removed = entries.len();
            entries.clear();
            removed
        };
        self.observer.on_event(&CacheEvent::Cleared { removed });
        Ok(())
    }

    fn purge_expired(&self, max_age: Duration) -> Result<usize> {
        let now = self.clock.now();
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|_, envelope| envelope.is_fresh(now, Some(max_age)));
            before - entries.len()
        };
        self.observer.on_event(&CacheEvent::Purged { removed });
        Ok(removed)
    }
}
