//! Backend used when caching is disabled

use std::time::Duration;

use serde_json::Value;

use super::backend::CacheBackend;
use super::error::Result;
use super::key::CacheKey;

/// Never stores anything; every load is a miss
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCacheBackend;

impl CacheBackend for NullCacheBackend {
    fn load(&self, _key: &CacheKey, _ttl: Option<Duration>) -> Option<Value> {
        None
    }

    fn save(&self, _key: &CacheKey, _payload: &Value) -> Result<()> {
        Ok(())
    }

    fn invalidate(&self, _key: &CacheKey) -> Result<()> {
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_saved_values_are_never_returned() {
        let cache = NullCacheBackend;
        let key = CacheKey::new("anything").unwrap();

        cache.save(&key, &json!({"a": 1})).unwrap();

        assert!(cache.load(&key, None).is_none());
        cache.invalidate(&key).unwrap();
        cache.clear_all().unwrap();
        assert_eq!(cache.purge_expired(Duration::ZERO).unwrap(), 0);
    }
}
