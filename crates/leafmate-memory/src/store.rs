//! [`MemoryStore`] – typed access to the records in `data.json`.
//!
//! # Example
//!
//! ```rust
//! use leafmate_memory::keys::MemoryAboutUser;
//! use leafmate_memory::store::MemoryStore;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = MemoryStore::open_in(dir.path()).unwrap();
//!
//! assert_eq!(store.get::<MemoryAboutUser>().unwrap(), None);
//! store.set::<MemoryAboutUser>(&"prefers green tea".to_string()).unwrap();
//! assert_eq!(
//!     store.get::<MemoryAboutUser>().unwrap().as_deref(),
//!     Some("prefers green tea"),
//! );
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::StoreError;
use crate::document::JsonDocument;
use crate::keys::StoreKey;

/// File name of the document inside the data directory.
pub const DATA_FILE: &str = "data.json";

/// Persistence adapter over a [`JsonDocument`].
///
/// Every [`set`][Self::set] and [`remove`][Self::remove] flushes the document
/// before returning.  Writes to the same key race with last-write-wins; there
/// is no cross-key transaction.
#[derive(Debug)]
pub struct MemoryStore {
    doc: Mutex<JsonDocument>,
}

impl MemoryStore {
    /// Open (or lazily create) the document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let doc = JsonDocument::load(path)?;
        debug!(path = %doc.path().display(), "memory store opened");
        Ok(Self {
            doc: Mutex::new(doc),
        })
    }

    /// Open `data.json` inside `dir`.
    pub fn open_in(dir: &Path) -> Result<Self, StoreError> {
        Self::open(dir.join(DATA_FILE))
    }

    /// Path of the backing file.
    pub fn path(&self) -> Result<PathBuf, StoreError> {
        Ok(self.lock()?.path().to_path_buf())
    }

    /// Read the record for `K`, or `None` if it was never set.
    pub fn get<K: StoreKey>(&self) -> Result<Option<K::Value>, StoreError> {
        let doc = self.lock()?;
        match doc.get(K::KEY.as_str()) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StoreError::Decode { key: K::KEY, source }),
            None => Ok(None),
        }
    }

    /// Overwrite the record for `K` and flush the document.
    ///
    /// If the flush fails the previous record is restored in memory.
    pub fn set<K: StoreKey>(&self, value: &K::Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_value(value)?;
        let mut doc = self.lock()?;
        let previous = doc.get(K::KEY.as_str()).cloned();
        doc.set(K::KEY.as_str(), encoded);
        if let Err(e) = doc.save() {
            match previous {
                Some(old) => doc.set(K::KEY.as_str(), old),
                None => {
                    doc.remove(K::KEY.as_str());
                }
            }
            return Err(e);
        }
        debug!(key = %K::KEY, "record written");
        Ok(())
    }

    /// Delete the record for `K` and flush the document.
    ///
    /// If the flush fails the record is put back in memory.
    pub fn remove<K: StoreKey>(&self) -> Result<(), StoreError> {
        let mut doc = self.lock()?;
        if let Some(old) = doc.remove(K::KEY.as_str()) {
            if let Err(e) = doc.save() {
                doc.set(K::KEY.as_str(), old);
                return Err(e);
            }
            debug!(key = %K::KEY, "record removed");
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, JsonDocument>, StoreError> {
        self.doc.lock().map_err(|_| StoreError::Poisoned)
    }
}
