//! File-backed cache storage
//!
//! Each key is stored as `{sha256-hex}.json` directly under the storage root.
//! Writes go to a `.kudoscache-*.tmp` file in the same directory which is then
//! renamed over the final path, so readers see either the old entry or the
//! new one and never a partial file.
//!
//! Only files matching those two naming conventions are ever removed, which
//! keeps `clear_all` safe on a root shared with other files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::{Builder, NamedTempFile};

use super::backend::CacheBackend;
use super::clock::{Clock, SystemClock};
use super::entry::{EntryFormat, Envelope};
use super::error::{CacheError, Result};
use super::key::{is_storage_id, CacheKey};
use super::observer::{CacheEvent, CacheObserver, TracingObserver};

/// Extension of committed entry files
const ENTRY_EXTENSION: &str = "json";

const TEMP_PREFIX: &str = ".kudoscache-";
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this are assumed to belong to a crashed writer
const ORPHANED_TEMP_AGE: Duration = Duration::from_secs(5 * 60);

/// Files under the root that this backend owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OwnedFile {
    Entry,
    Temp,
}

fn classify(file_name: &str) -> Option<OwnedFile> {
    if let Some(stem) = file_name.strip_suffix(".json") {
        if is_storage_id(stem) {
            return Some(OwnedFile::Entry);
        }
    }
    if file_name.starts_with(TEMP_PREFIX) && file_name.ends_with(TEMP_SUFFIX) {
        return Some(OwnedFile::Temp);
    }
    None
}

fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
}

/// Creates the storage root if needed and checks that it is a writable directory
fn ensure_root(root: &Path) -> Result<()> {
    match fs::metadata(root) {
        Ok(meta) if !meta.is_dir() => {
            return Err(CacheError::configuration(
                root,
                "path exists and is not a directory",
            ));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(root).map_err(|e| {
                CacheError::configuration(root, format!("cannot create directory: {e}"))
            })?;
        }
        Err(e) => {
            return Err(CacheError::configuration(
                root,
                format!("cannot inspect path: {e}"),
            ));
        }
    }

    // The probe file is deleted when dropped.
    temp_file_in(root).map_err(|e| {
        CacheError::configuration(root, format!("directory is not writable: {e}"))
    })?;
    Ok(())
}

/// Cache backend persisting one JSON envelope per key in a directory
#[derive(Debug, Clone)]
pub struct FileCacheBackend {
    /// Directory where cache files are stored
    root: PathBuf,
    format: EntryFormat,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

impl FileCacheBackend {
    /// Opens a backend rooted at `root`, creating the directory if missing
    ///
    /// Fails with [`CacheError::Configuration`] if `root` exists but is not a
    /// directory, or if it cannot be created or written to.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_root(&root)?;
        tracing::debug!(root = %root.display(), "opened file cache");

        Ok(Self {
            root,
            format: EntryFormat::default(),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_format(mut self, format: EntryFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the file holding `key`
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}.{}", key.storage_id(), ENTRY_EXTENSION))
    }

    /// Reads the envelope at `path`
    ///
    /// `Ok(None)` means there is no entry. Anything unreadable, including an
    /// envelope recorded under a different key, is a `CorruptEntry`.
    fn read_entry(&self, path: &Path, key: Option<&CacheKey>) -> Result<Option<Envelope>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::corrupt(path, e)),
        };

        let envelope = self
            .format
            .decode(&bytes)
            .map_err(|e| CacheError::corrupt(path, e))?;

        if let Some(key) = key {
            if envelope.key != key.as_str() {
                return Err(CacheError::corrupt(
                    path,
                    format!("entry belongs to key '{}'", envelope.key),
                ));
            }
        }

        Ok(Some(envelope))
    }

    /// Lists files in the root that this backend owns
    fn owned_files(&self) -> Result<Vec<(PathBuf, OwnedFile)>> {
        let entries = fs::read_dir(&self.root).map_err(|e| CacheError::io(&self.root, e))?;

        let mut owned = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.root, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| CacheError::io(&entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(kind) = name.to_str().and_then(classify) {
                owned.push((entry.path(), kind));
            }
        }
        Ok(owned)
    }

    /// Removes a file, treating an already-missing file as success
    ///
    /// Returns whether the file existed.
    fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Removes a temp file only if no live writer can still own it
    fn remove_if_orphaned(path: &Path) -> Result<bool> {
        let age = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        match age {
            Some(age) if age >= ORPHANED_TEMP_AGE => Self::remove(path),
            _ => Ok(false),
        }
    }
}

impl CacheBackend for FileCacheBackend {
    fn load(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<Value> {
        let path = self.entry_path(key);

        let envelope = match self.read_entry(&path, Some(key)) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                self.observer.on_event(&CacheEvent::Miss { key: key.as_str() });
                return None;
            }
            Err(err) => {
                let reason = err.to_string();
                self.observer.on_event(&CacheEvent::Corrupt {
                    key: key.as_str(),
                    path: &path,
                    reason: &reason,
                });
                return None;
            }
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
        Some(envelope.payload)
    }

    fn save(&self, key: &CacheKey, payload: &Value) -> Result<()> {
        let envelope = Envelope::new(key.as_str(), self.clock.now(), payload.clone());
        let bytes = self.format.encode(&envelope)?;
        let path = self.entry_path(key);

        let mut tmp = temp_file_in(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        tmp.write_all(&bytes)
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| CacheError::io(&path, e.error))?;

        self.observer.on_event(&CacheEvent::Stored { key: key.as_str() });
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let existed = Self::remove(&self.entry_path(key))?;
        self.observer.on_event(&CacheEvent::Invalidated {
            key: key.as_str(),
            existed,
        });
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let mut removed = 0;
        for (path, kind) in self.owned_files()? {
            match kind {
                OwnedFile::Entry => {
                    if Self::remove(&path)? {
                        removed += 1;
                    }
                }
                OwnedFile::Temp => {
                    Self::remove_if_orphaned(&path)?;
                }
            }
        }

        self.observer.on_event(&CacheEvent::Cleared { removed });
        Ok(())
    }

    fn purge_expired(&self, max_age: Duration) -> Result<usize> {
        let now = self.clock.now();
        let mut removed = 0;

        for (path, kind) in self.owned_files()? {
            let stale = match kind {
                OwnedFile::Temp => {
                    Self::remove_if_orphaned(&path)?;
                    continue;
                }
                OwnedFile::Entry => match self.read_entry(&path, None) {
                    Ok(Some(envelope)) => !envelope.is_fresh(now, Some(max_age)),
                    // Removed by someone else since the listing.
                    Ok(None) => false,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "purging unreadable cache entry");
                        true
                    }
                },
            };

            if stale && Self::remove(&path)? {
                removed += 1;
            }
        }

        self.observer.on_event(&CacheEvent::Purged { removed });
        Ok(removed)
    }
}
