//! `leafmate-memory` – persistent conversational memory.
//!
//! Everything lives in a single `data.json` document inside the
//! application's data directory.
//!
//! # Modules
//!
//! - [`document`] – [`JsonDocument`][document::JsonDocument]: the raw
//!   load / get / set / save key-value document.
//! - [`keys`] – [`StoreKey`][keys::StoreKey]: the closed set of records, each
//!   with a compile-time value type.
//! - [`store`] – [`MemoryStore`][store::MemoryStore]: typed get / set /
//!   remove, flushing on every write.
//! - [`book`] – [`MemoryBook`][book::MemoryBook]: snapshot, export and the
//!   confirmation-guarded reset.
//! - [`chat_store`] – [`ChatStorage`][leafmate_registry::ChatStorage]
//!   implementations backed by the document or by process memory.

use std::path::PathBuf;

use leafmate_types::LeafError;
use thiserror::Error;

pub mod book;
pub mod chat_store;
pub mod document;
pub mod keys;
pub mod store;

pub use book::{MemoryBook, MemorySnapshot, RESET_CONFIRMATION};
pub use chat_store::{DocumentChatStorage, SessionChatStorage};
pub use keys::{StoreKey, StoreKeys};
pub use store::MemoryStore;

// ─────────────────────────────────────────────────────────────────────────────
// Error types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Document at {} is not a JSON object", .0.display())]
    NotAnObject(PathBuf),

    #[error("Stored value for '{key}' has an unexpected shape: {source}")]
    Decode {
        key: StoreKeys,
        #[source]
        source: serde_json::Error,
    },

    #[error("Memory store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for LeafError {
    fn from(e: StoreError) -> Self {
        LeafError::Storage(e.to_string())
    }
}

/// Errors raised by [`MemoryBook`] operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Confirmation text does not match; memory left untouched")]
    ConfirmationMismatch,

    #[error("Failed to export memory to {}: {source}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialise memory: {0}")]
    Serialize(#[from] serde_json::Error),
}
