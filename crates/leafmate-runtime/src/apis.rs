//! Default wiring of the [`ApiRegistry`] and persistence of the user's
//! per-slot choices.
//!
//! # Built-in entries
//!
//! | slot    | entries (first is the default)            |
//! |---------|-------------------------------------------|
//! | chat    | [`CHAT_OLLAMA`]                           |
//! | speak   | [`SPEECH_OFF`], [`SPEAKER_COMMAND`] when a TTS command is configured |
//! | store   | [`STORE_DOCUMENT`], [`STORE_SESSION`]     |
//! | live2d  | [`CAT_BOY`], [`FOX_BOY`]                  |

use std::sync::Arc;

use leafmate_memory::keys::{DefaultChatApi, DefaultLive2d, DefaultSpeakApi, DefaultStoreApi};
use leafmate_memory::store::MemoryStore;
use leafmate_memory::{DocumentChatStorage, SessionChatStorage, StoreError};
use leafmate_registry::{ApiRegistry, SPEECH_OFF};
use leafmate_types::CapabilityKind;
use tracing::{debug, info};

use crate::avatar::{CAT_BOY, FOX_BOY, Live2dAvatar};
use crate::chat_driver::{DEFAULT_MODEL, OllamaChat};
use crate::speech::CommandSpeaker;

pub const CHAT_OLLAMA: &str = "Ollama";
pub const SPEAKER_COMMAND: &str = "Command TTS";
/// Chat history kept in `data.json`.
pub const STORE_DOCUMENT: &str = "Document";
/// Chat history kept in process memory only.
pub const STORE_SESSION: &str = "Session";

/// What the runtime needs to build its default implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub ollama_url: String,
    pub model: String,
    /// Replaces the built-in persona when set.
    pub system_prompt: Option<String>,
    /// TTS command line; `None` or blank leaves speech permanently off.
    pub speech_command: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            speech_command: None,
        }
    }
}

/// Build the Ollama driver described by `cfg`.
pub fn ollama_from(cfg: &ApiConfig) -> OllamaChat {
    let chat = OllamaChat::new(&cfg.ollama_url, &cfg.model);
    match &cfg.system_prompt {
        Some(prompt) => chat.with_system_prompt(prompt),
        None => chat,
    }
}

/// Build a registry holding every built-in implementation.
pub fn default_registry(cfg: &ApiConfig, store: Arc<MemoryStore>) -> ApiRegistry {
    let mut registry = ApiRegistry::new(
        CHAT_OLLAMA,
        Arc::new(ollama_from(cfg)),
        STORE_DOCUMENT,
        Arc::new(DocumentChatStorage::new(store)),
        CAT_BOY,
        Arc::new(Live2dAvatar::cat_boy()),
    );
    registry.register_chat_storage(STORE_SESSION, Arc::new(SessionChatStorage::new()));
    registry.register_avatar(FOX_BOY, Arc::new(Live2dAvatar::fox_boy()));
    if let Some(speaker) = cfg
        .speech_command
        .as_deref()
        .and_then(CommandSpeaker::from_command_line)
    {
        registry.register_speaker(SPEAKER_COMMAND, Arc::new(speaker));
    }
    registry
}

/// Re-select the choices saved by [`select_and_persist`].
///
/// Saved names that no longer match a registered entry are ignored, leaving
/// that slot on its default.
pub fn apply_saved_defaults(registry: &mut ApiRegistry, store: &MemoryStore) -> Result<(), StoreError> {
    for kind in CapabilityKind::ALL {
        let Some(name) = saved_default(store, kind)? else {
            continue;
        };
        if registry.select(kind, &name) {
            debug!(%kind, %name, "saved default restored");
        }
    }
    Ok(())
}

/// Select `name` in `kind` and remember it for the next start.
///
/// Returns `false`, without writing anything, when `name` is not registered.
pub fn select_and_persist(
    registry: &mut ApiRegistry,
    store: &MemoryStore,
    kind: CapabilityKind,
    name: &str,
) -> Result<bool, StoreError> {
    if !registry.select(kind, name) {
        return Ok(false);
    }
    let name = name.to_string();
    match kind {
        CapabilityKind::ChatCompletion => store.set::<DefaultChatApi>(&name)?,
        CapabilityKind::SpeechSynthesis => store.set::<DefaultSpeakApi>(&name)?,
        CapabilityKind::ChatStorage => store.set::<DefaultStoreApi>(&name)?,
        CapabilityKind::AvatarLoader => store.set::<DefaultLive2d>(&name)?,
    }
    info!(%kind, %name, "default saved");
    Ok(true)
}

fn saved_default(store: &MemoryStore, kind: CapabilityKind) -> Result<Option<String>, StoreError> {
    match kind {
        CapabilityKind::ChatCompletion => store.get::<DefaultChatApi>(),
        CapabilityKind::SpeechSynthesis => store.get::<DefaultSpeakApi>(),
        CapabilityKind::ChatStorage => store.get::<DefaultStoreApi>(),
        CapabilityKind::AvatarLoader => store.get::<DefaultLive2d>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, Arc<MemoryStore>) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = Arc::new(MemoryStore::open_in(dir.path()).expect("open"));
        (dir, store)
    }

    #[test]
    fn default_registry_lists_builtins_in_order() {
        let (_dir, store) = store();
        let registry = default_registry(&ApiConfig::default(), store);
        assert_eq!(registry.list_names(CapabilityKind::ChatCompletion), vec![CHAT_OLLAMA]);
        assert_eq!(registry.list_names(CapabilityKind::SpeechSynthesis), vec![SPEECH_OFF]);
        assert_eq!(
            registry.list_names(CapabilityKind::ChatStorage),
            vec![STORE_DOCUMENT, STORE_SESSION]
        );
        assert_eq!(registry.list_names(CapabilityKind::AvatarLoader), vec![CAT_BOY, FOX_BOY]);
        assert!(registry.speaker().is_none());
    }

    #[test]
    fn speech_command_adds_speaker_entry() {
        let (_dir, store) = store();
        let cfg = ApiConfig {
            speech_command: Some("espeak -v zh".into()),
            ..ApiConfig::default()
        };
        let registry = default_registry(&cfg, store);
        assert_eq!(
            registry.list_names(CapabilityKind::SpeechSynthesis),
            vec![SPEECH_OFF, SPEAKER_COMMAND]
        );
        // Speech stays off until chosen.
        assert_eq!(registry.current_name(CapabilityKind::SpeechSynthesis), SPEECH_OFF);
    }

    #[test]
    fn selection_survives_restart() {
        let (dir, store) = store();
        let mut registry = default_registry(&ApiConfig::default(), store.clone());
        assert!(select_and_persist(&mut registry, &store, CapabilityKind::AvatarLoader, FOX_BOY).unwrap());
        assert!(select_and_persist(&mut registry, &store, CapabilityKind::ChatStorage, STORE_SESSION).unwrap());

        let reopened = Arc::new(MemoryStore::open_in(dir.path()).unwrap());
        let mut fresh = default_registry(&ApiConfig::default(), reopened.clone());
        apply_saved_defaults(&mut fresh, &reopened).unwrap();
        assert_eq!(fresh.current_name(CapabilityKind::AvatarLoader), FOX_BOY);
        assert_eq!(fresh.current_name(CapabilityKind::ChatStorage), STORE_SESSION);
        assert_eq!(fresh.current_name(CapabilityKind::ChatCompletion), CHAT_OLLAMA);
    }

    #[test]
    fn unknown_name_is_not_persisted() {
        let (_dir, store) = store();
        let mut registry = default_registry(&ApiConfig::default(), store.clone());
        let saved = select_and_persist(&mut registry, &store, CapabilityKind::AvatarLoader, "狗").unwrap();
        assert!(!saved);
        assert_eq!(store.get::<DefaultLive2d>().unwrap(), None);
        assert_eq!(registry.current_name(CapabilityKind::AvatarLoader), CAT_BOY);
    }

    #[test]
    fn stale_saved_default_is_ignored() {
        let (_dir, store) = store();
        store.set::<DefaultSpeakApi>(&"Web Speech API".to_string()).unwrap();
        let mut registry = default_registry(&ApiConfig::default(), store.clone());
        apply_saved_defaults(&mut registry, &store).unwrap();
        assert_eq!(registry.current_name(CapabilityKind::SpeechSynthesis), SPEECH_OFF);
    }
}
