//! Cache settings read from the environment
//!
//! | Variable                 | Meaning                                   |
//! |--------------------------|-------------------------------------------|
//! | `KUDOSCACHE_BACKEND`     | `file` (default), `memory` or `none`      |
//! | `KUDOSCACHE_DIR`         | storage root for the file backend         |
//! | `KUDOSCACHE_TTL_MINUTES` | default TTL applied when callers pass none |
//!
//! Without `KUDOSCACHE_DIR` the file backend uses the XDG cache directory
//! (`~/.cache/kudoscache/` on Linux).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;

pub const BACKEND_ENV: &str = "KUDOSCACHE_BACKEND";
pub const DIR_ENV: &str = "KUDOSCACHE_DIR";
pub const TTL_ENV: &str = "KUDOSCACHE_TTL_MINUTES";

/// Errors in cache settings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid cache backend: '{0}'. Valid backends: file, memory, none")]
    InvalidBackend(String),

    #[error("Invalid TTL: '{0}'. Expected a whole number of minutes")]
    InvalidTtl(String),

    #[error("Duration of {0} minutes is too large")]
    MinutesOutOfRange(u64),
}

/// Which storage strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    File,
    Memory,
    Disabled,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::File => "file",
            BackendKind::Memory => "memory",
            BackendKind::Disabled => "none",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(BackendKind::File),
            "memory" | "mem" => Ok(BackendKind::Memory),
            "none" | "off" | "disabled" => Ok(BackendKind::Disabled),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

/// Converts whole minutes to a duration, rejecting counts whose seconds overflow
pub fn duration_from_minutes(minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or(ConfigError::MinutesOutOfRange(minutes))
}

/// Parses a TTL given in whole minutes
pub fn parse_ttl_minutes(value: &str) -> Result<Duration, ConfigError> {
    let minutes = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidTtl(value.to_string()))?;
    duration_from_minutes(minutes)
}

/// Returns the platform cache directory for kudoscache, if one can be determined
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "kudoscache").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Settings needed to build a [`CacheManager`](crate::cache::CacheManager)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheSettings {
    pub backend: BackendKind,
    /// Storage root; `None` means the platform default
    pub dir: Option<PathBuf>,
    /// TTL applied when a caller does not pass one
    pub default_ttl: Option<Duration>,
}

impl CacheSettings {
    /// Reads settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backend = match get(BACKEND_ENV) {
            Some(value) => value.parse()?,
            None => BackendKind::default(),
        };
        let dir = get(DIR_ENV).map(PathBuf::from);
        let default_ttl = get(TTL_ENV).as_deref().map(parse_ttl_minutes).transpose()?;

        Ok(Self {
            backend,
            dir,
            default_ttl,
        })
    }

    /// Storage root to use for the file backend
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.dir.clone().or_else(default_cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = CacheSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, CacheSettings::default());
        assert_eq!(settings.backend, BackendKind::File);
    }

    #[test]
    fn test_reads_all_variables() {
        let settings = CacheSettings::from_lookup(lookup_from(&[
            (BACKEND_ENV, "memory"),
            (DIR_ENV, "/var/cache/kudos"),
            (TTL_ENV, "90"),
        ]))
        .unwrap();

        assert_eq!(settings.backend, BackendKind::Memory);
        assert_eq!(settings.dir, Some(PathBuf::from("/var/cache/kudos")));
        assert_eq!(settings.default_ttl, Some(Duration::from_secs(90 * 60)));
        assert_eq!(settings.cache_dir(), Some(PathBuf::from("/var/cache/kudos")));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let settings =
            CacheSettings::from_lookup(lookup_from(&[(BACKEND_ENV, " "), (TTL_ENV, "")])).unwrap();
        assert_eq!(settings, CacheSettings::default());
    }

    #[test]
    fn test_invalid_backend() {
        let err = CacheSettings::from_lookup(lookup_from(&[(BACKEND_ENV, "redis")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidBackend("redis".to_string()));
        assert!(err.to_string().contains("file, memory, none"));
    }

    #[test]
    fn test_invalid_ttl() {
        let err = CacheSettings::from_lookup(lookup_from(&[(TTL_ENV, "1.5h")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTtl("1.5h".to_string()));
    }

    #[test]
    fn test_ttl_too_large_is_rejected() {
        let huge = "307445734561825861";
        let err = CacheSettings::from_lookup(lookup_from(&[(TTL_ENV, huge)])).unwrap_err();
        assert_eq!(err, ConfigError::MinutesOutOfRange(307_445_734_561_825_861));

        let largest = u64::MAX / 60;
        assert_eq!(
            duration_from_minutes(largest).unwrap(),
            Duration::from_secs(largest * 60)
        );
        assert!(duration_from_minutes(largest + 1).is_err());
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!("FILE".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!("off".parse::<BackendKind>().unwrap(), BackendKind::Disabled);
        assert_eq!("disabled".parse::<BackendKind>().unwrap(), BackendKind::Disabled);
        assert_eq!(BackendKind::Disabled.as_str(), "none");
    }

    #[test]
    fn test_default_cache_dir_mentions_project() {
        if let Some(dir) = default_cache_dir() {
            assert!(dir.to_string_lossy().contains("kudoscache"));
        }
        // Passes if no home directory is available (e.g. in CI)
    }
}
