//! [`ApiRegistry`] – the process-wide table of capability slots.
//!
//! The registry owns one [`Slot`] per [`CapabilityKind`]. Shells list the
//! names in a slot, let the user pick one, and then fetch the active
//! implementation through the typed accessor for that slot.
//!
//! Selecting an unknown name is silently ignored: names always come from
//! [`ApiRegistry::list_names`], so a miss is harmless and only logged.

use std::sync::Arc;

use leafmate_types::CapabilityKind;
use tracing::{debug, info};

use crate::capability::{AvatarLoader, ChatApi, ChatStorage, Speaker};
use crate::slot::Slot;

/// Name of the speech entry that disables speech output.
pub const SPEECH_OFF: &str = "关闭";

/// Holds the registered implementations for every capability slot.
///
/// Construct with [`ApiRegistry::new`], register further implementations,
/// then hand the registry to the shell.
pub struct ApiRegistry {
    chat: Slot<Arc<dyn ChatApi>>,
    speech: Slot<Option<Arc<dyn Speaker>>>,
    storage: Slot<Arc<dyn ChatStorage>>,
    avatar: Slot<Arc<dyn AvatarLoader>>,
}

impl ApiRegistry {
    /// Create a registry from the default implementation of each mandatory
    /// slot.  The speech slot starts with only the [`SPEECH_OFF`] entry.
    pub fn new(
        chat_name: &str,
        chat: Arc<dyn ChatApi>,
        storage_name: &str,
        storage: Arc<dyn ChatStorage>,
        avatar_name: &str,
        avatar: Arc<dyn AvatarLoader>,
    ) -> Self {
        Self {
            chat: Slot::new(chat_name, chat),
            speech: Slot::new(SPEECH_OFF, None),
            storage: Slot::new(storage_name, storage),
            avatar: Slot::new(avatar_name, avatar),
        }
    }

    /// Register a chat backend.  Any previous backend with the same name is
    /// replaced.
    pub fn register_chat(&mut self, name: &str, api: Arc<dyn ChatApi>) {
        self.chat.register(name, api);
    }

    /// Register a speech engine.  Any previous engine with the same name is
    /// replaced.
    pub fn register_speaker(&mut self, name: &str, speaker: Arc<dyn Speaker>) {
        self.speech.register(name, Some(speaker));
    }

    /// Register a chat-history store.  Any previous store with the same name
    /// is replaced.
    pub fn register_chat_storage(&mut self, name: &str, storage: Arc<dyn ChatStorage>) {
        self.storage.register(name, storage);
    }

    /// Register an avatar.  Any previous avatar with the same name is
    /// replaced.
    pub fn register_avatar(&mut self, name: &str, avatar: Arc<dyn AvatarLoader>) {
        self.avatar.register(name, avatar);
    }

    /// Names registered for `kind`, in registration order.
    pub fn list_names(&self, kind: CapabilityKind) -> Vec<&str> {
        match kind {
            CapabilityKind::ChatCompletion => self.chat.names(),
            CapabilityKind::SpeechSynthesis => self.speech.names(),
            CapabilityKind::ChatStorage => self.storage.names(),
            CapabilityKind::AvatarLoader => self.avatar.names(),
        }
    }

    /// Activate the implementation registered under `name` for `kind`.
    ///
    /// Returns whether the name matched; an unknown name changes nothing.
    pub fn select(&mut self, kind: CapabilityKind, name: &str) -> bool {
        let matched = match kind {
            CapabilityKind::ChatCompletion => self.chat.select(name),
            CapabilityKind::SpeechSynthesis => self.speech.select(name),
            CapabilityKind::ChatStorage => self.storage.select(name),
            CapabilityKind::AvatarLoader => self.avatar.select(name),
        };
        if matched {
            info!(slot = %kind, name, "capability selected");
        } else {
            debug!(slot = %kind, name, "ignoring selection of unregistered name");
        }
        matched
    }

    /// Name of the active implementation for `kind`.
    pub fn current_name(&self, kind: CapabilityKind) -> &str {
        match kind {
            CapabilityKind::ChatCompletion => self.chat.current_name(),
            CapabilityKind::SpeechSynthesis => self.speech.current_name(),
            CapabilityKind::ChatStorage => self.storage.current_name(),
            CapabilityKind::AvatarLoader => self.avatar.current_name(),
        }
    }

    /// The active chat backend.
    pub fn chat(&self) -> Arc<dyn ChatApi> {
        Arc::clone(self.chat.current())
    }

    /// The active speech engine, or `None` when speech is off.
    pub fn speaker(&self) -> Option<Arc<dyn Speaker>> {
        self.speech.current().clone()
    }

    /// The active chat-history store.
    pub fn chat_storage(&self) -> Arc<dyn ChatStorage> {
        Arc::clone(self.storage.current())
    }

    /// The active avatar.
    pub fn avatar(&self) -> Arc<dyn AvatarLoader> {
        Arc::clone(self.avatar.current())
    }
}
