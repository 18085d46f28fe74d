//! [`JsonDocument`] – a single JSON object persisted to one file.
//!
//! This is the raw key-value collaborator underneath
//! [`MemoryStore`][crate::store::MemoryStore]: string keys, untyped
//! [`serde_json::Value`] payloads, and an explicit [`JsonDocument::save`]
//! that flushes the whole document.
//!
//! Saving writes a sibling `*.tmp` file and renames it over the target, so a
//! crash mid-write leaves the previous document intact.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::StoreError;

/// An in-memory JSON object bound to a backing file.
#[derive(Debug)]
pub struct JsonDocument {
    path: PathBuf,
    data: Map<String, Value>,
}

impl JsonDocument {
    /// Load the document at `path`.  A missing file yields an empty document;
    /// the file is only created on the first [`save`][Self::save].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                data: Map::new(),
            });
        }
        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let data = if raw.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => return Err(StoreError::NotAnObject(path)),
            }
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Durably write the whole document to its backing file.
    pub fn save(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = serde_json::to_string_pretty(&self.data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let doc = JsonDocument::load(dir.path().join("data.json")).unwrap();
        assert!(doc.get("anything").is_none());
        assert!(!doc.path().exists());
    }

    #[test]
    fn save_then_reload() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("data.json");

        let mut doc = JsonDocument::load(&path).unwrap();
        doc.set("memory_about_user", json!("likes tea"));
        doc.save().unwrap();

        let reloaded = JsonDocument::load(&path).unwrap();
        assert_eq!(reloaded.get("memory_about_user"), Some(&json!("likes tea")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn remove_drops_key() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut doc = JsonDocument::load(dir.path().join("data.json")).unwrap();
        doc.set("k", json!(1));
        assert_eq!(doc.remove("k"), Some(json!(1)));
        assert!(doc.get("k").is_none());
    }

    #[test]
    fn non_object_document_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = JsonDocument::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject(_)));
    }

    #[test]
    fn corrupt_document_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonDocument::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)));
    }
}
