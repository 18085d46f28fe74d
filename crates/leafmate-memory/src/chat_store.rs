//! [`ChatStorage`] implementations for the chat-storage slot.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use leafmate_registry::ChatStorage;
use leafmate_types::{LeafError, ShortTermMemory};

use crate::keys::ShortTermMemoryList;
use crate::store::MemoryStore;

/// Keeps the conversation under `short_term_memory` in `data.json`.
#[derive(Debug, Clone)]
pub struct DocumentChatStorage {
    store: Arc<MemoryStore>,
}

impl DocumentChatStorage {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatStorage for DocumentChatStorage {
    async fn load_chat(&self) -> Result<Vec<ShortTermMemory>, LeafError> {
        Ok(self.store.get::<ShortTermMemoryList>()?.unwrap_or_default())
    }

    async fn save_chat(&self, chat: &[ShortTermMemory]) -> Result<(), LeafError> {
        self.store.set::<ShortTermMemoryList>(&chat.to_vec())?;
        Ok(())
    }

    async fn delete_chat(&self) -> Result<(), LeafError> {
        self.store.remove::<ShortTermMemoryList>()?;
        Ok(())
    }
}

/// Holds the conversation for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct SessionChatStorage {
    log: Mutex<Vec<ShortTermMemory>>,
}

impl SessionChatStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStorage for SessionChatStorage {
    async fn load_chat(&self) -> Result<Vec<ShortTermMemory>, LeafError> {
        let log = self
            .log
            .lock()
            .map_err(|_| LeafError::Storage("session log lock poisoned".into()))?;
        Ok(log.clone())
    }

    async fn save_chat(&self, chat: &[ShortTermMemory]) -> Result<(), LeafError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| LeafError::Storage("session log lock poisoned".into()))?;
        *log = chat.to_vec();
        Ok(())
    }

    async fn delete_chat(&self) -> Result<(), LeafError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| LeafError::Storage("session log lock poisoned".into()))?;
        log.clear();
        Ok(())
    }
}
