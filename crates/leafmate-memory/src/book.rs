//! [`MemoryBook`] – the memory operations a shell exposes to the user.
//!
//! Reading goes through [`MemoryBook::snapshot`]; the only destructive
//! operation is [`MemoryBook::reset_all`], which is guarded by the exact
//! [`RESET_CONFIRMATION`] phrase.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use leafmate_types::LongTermMemory;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::keys::{LongTermMemoryList, MemoryAboutSelf, MemoryAboutUser};
use crate::store::MemoryStore;
use crate::MemoryError;

/// Phrase the user must type, verbatim, before all memory is erased.
pub const RESET_CONFIRMATION: &str = "删除所有记忆";

/// Everything the companion remembers beyond the current conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub memory_about_self: Option<String>,
    pub memory_about_user: Option<String>,
    pub long_term_memory: Vec<LongTermMemory>,
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.memory_about_self.is_none()
            && self.memory_about_user.is_none()
            && self.long_term_memory.is_empty()
    }
}

/// Memory operations over a shared [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryBook {
    store: Arc<MemoryStore>,
}

impl MemoryBook {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Read self, user and long-term memory in one go.
    pub fn snapshot(&self) -> Result<MemorySnapshot, MemoryError> {
        Ok(MemorySnapshot {
            memory_about_self: self.store.get::<MemoryAboutSelf>()?,
            memory_about_user: self.store.get::<MemoryAboutUser>()?,
            long_term_memory: self.store.get::<LongTermMemoryList>()?.unwrap_or_default(),
        })
    }

    pub fn set_about_self(&self, text: &str) -> Result<(), MemoryError> {
        self.store.set::<MemoryAboutSelf>(&text.to_string())?;
        Ok(())
    }

    pub fn set_about_user(&self, text: &str) -> Result<(), MemoryError> {
        self.store.set::<MemoryAboutUser>(&text.to_string())?;
        Ok(())
    }

    /// Store a long-term summary.  A record with the same id is replaced in
    /// place; a new id is appended.
    pub fn remember_summary(&self, memory: LongTermMemory) -> Result<(), MemoryError> {
        let mut all = self.store.get::<LongTermMemoryList>()?.unwrap_or_default();
        match all.iter_mut().find(|m| m.id == memory.id) {
            Some(existing) => *existing = memory,
            None => all.push(memory),
        }
        self.store.set::<LongTermMemoryList>(&all)?;
        Ok(())
    }

    /// Summarise the window `[start, end]` under a fresh id and return it.
    pub fn remember_window(
        &self,
        start: i64,
        end: i64,
        summary: impl Into<String>,
    ) -> Result<String, MemoryError> {
        let id = Uuid::new_v4().to_string();
        self.remember_summary(LongTermMemory {
            id: id.clone(),
            start,
            end,
            summary: summary.into(),
        })?;
        Ok(id)
    }

    /// Write self, user and long-term memory to a timestamped JSON file in
    /// `dir` and return its path.  Empty memory still produces a file.
    pub fn export_all(&self, dir: &Path) -> Result<PathBuf, MemoryError> {
        let snapshot = self.snapshot()?;
        let export_err = |source: std::io::Error| MemoryError::Export {
            path: dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).map_err(export_err)?;

        let file_name = format!(
            "leafmate-memory-{}.json",
            Local::now().format("%Y%m%d-%H%M%S-%3f")
        );
        let path = dir.join(file_name);
        let raw = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&path, raw).map_err(export_err)?;

        info!(
            path = %path.display(),
            long_term = snapshot.long_term_memory.len(),
            "memory exported"
        );
        Ok(path)
    }

    /// Erase self, user and long-term memory.
    ///
    /// `confirmation` must equal [`RESET_CONFIRMATION`] exactly; otherwise
    /// nothing is touched and [`MemoryError::ConfirmationMismatch`] is
    /// returned.  The active conversation is left alone.
    pub fn reset_all(&self, confirmation: &str) -> Result<(), MemoryError> {
        if confirmation != RESET_CONFIRMATION {
            warn!("memory reset rejected: confirmation text mismatch");
            return Err(MemoryError::ConfirmationMismatch);
        }
        self.store.remove::<MemoryAboutSelf>()?;
        self.store.remove::<MemoryAboutUser>()?;
        self.store.remove::<LongTermMemoryList>()?;
        info!("all long-lived memory erased");
        Ok(())
    }
}
