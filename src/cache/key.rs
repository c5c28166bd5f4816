//! Cache key codec
//!
//! Logical keys are free-form strings such as `slack_kudos:member:alice:2025`.
//! Storage never uses them directly: each key is reduced to the hex SHA-256
//! digest of its bytes, which is injective for all practical purposes and
//! contains no path separators or dots.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::{CacheError, Result};

/// Length of a storage identifier in hex characters
pub const STORAGE_ID_LEN: usize = 64;

/// A validated logical cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a key from an arbitrary non-empty string
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(Self(key))
    }

    /// Derives a key from a prefix and a set of request parameters
    ///
    /// The parameters are serialized to JSON with object keys sorted, so two
    /// parameter sets with the same fields in a different order produce the
    /// same key. The result reads `{prefix}_{sha256-hex}`.
    pub fn from_params<P: Serialize + ?Sized>(prefix: &str, params: &P) -> Result<Self> {
        if prefix.is_empty() {
            return Err(CacheError::InvalidKey(
                "key prefix must not be empty".to_string(),
            ));
        }
        // serde_json::Map is a BTreeMap, so going through Value sorts object keys.
        let canonical = serde_json::to_value(params)?.to_string();
        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
        Ok(Self(format!("{}_{}", prefix, digest)))
    }

    /// Returns the logical key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the filesystem-safe storage identifier for this key
    pub fn storage_id(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

/// Returns true if `s` has the shape of a storage identifier
pub fn is_storage_id(s: &str) -> bool {
    s.len() == STORAGE_ID_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for CacheKey {
    type Error = CacheError;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = CacheError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}
