//! The closed set of persisted records.
//!
//! Every record in `data.json` is addressed by a zero-sized marker type that
//! implements [`StoreKey`].  The marker fixes both the on-disk key string and
//! the Rust type of its value, so
//! [`MemoryStore::set`][crate::store::MemoryStore::set] rejects a long-term
//! memory list for a string key at compile time.
//!
//! [`StoreKey`] is sealed: new records are added here, never by callers.

use std::fmt;

use leafmate_types::{LongTermMemory, ShortTermMemory};
use serde::Serialize;
use serde::de::DeserializeOwned;

mod sealed {
    pub trait Sealed {}
}

/// Every key that may appear in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKeys {
    DefaultLive2d,
    DefaultChatApi,
    DefaultSpeakApi,
    DefaultStoreApi,
    /// What the companion remembers about itself.
    MemoryAboutSelf,
    /// What the companion remembers about the user.
    MemoryAboutUser,
    /// Summaries of past conversations.
    LongTermMemory,
    /// The active conversation.
    ShortTermMemory,
}

impl StoreKeys {
    pub const ALL: [StoreKeys; 8] = [
        StoreKeys::DefaultLive2d,
        StoreKeys::DefaultChatApi,
        StoreKeys::DefaultSpeakApi,
        StoreKeys::DefaultStoreApi,
        StoreKeys::MemoryAboutSelf,
        StoreKeys::MemoryAboutUser,
        StoreKeys::LongTermMemory,
        StoreKeys::ShortTermMemory,
    ];

    /// The key string used inside `data.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKeys::DefaultLive2d => "default_live2d",
            StoreKeys::DefaultChatApi => "default_chat_api",
            StoreKeys::DefaultSpeakApi => "default_speak_api",
            StoreKeys::DefaultStoreApi => "default_store_api",
            StoreKeys::MemoryAboutSelf => "memory_about_self",
            StoreKeys::MemoryAboutUser => "memory_about_user",
            StoreKeys::LongTermMemory => "long_term_memory",
            StoreKeys::ShortTermMemory => "short_term_memory",
        }
    }
}

impl fmt::Display for StoreKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed handle on one persisted record.
pub trait StoreKey: sealed::Sealed {
    /// Shape of the stored value.
    type Value: Serialize + DeserializeOwned;
    const KEY: StoreKeys;
}

macro_rules! store_key {
    ($(#[$doc:meta])* $marker:ident, $variant:ident, $value:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl sealed::Sealed for $marker {}

        impl StoreKey for $marker {
            type Value = $value;
            const KEY: StoreKeys = StoreKeys::$variant;
        }
    };
}

store_key!(
    /// Name of the avatar selected at startup.
    DefaultLive2d, DefaultLive2d, String
);
store_key!(
    /// Name of the chat backend selected at startup.
    DefaultChatApi, DefaultChatApi, String
);
store_key!(
    /// Name of the speech engine selected at startup.
    DefaultSpeakApi, DefaultSpeakApi, String
);
store_key!(
    /// Name of the chat-history store selected at startup.
    DefaultStoreApi, DefaultStoreApi, String
);
store_key!(MemoryAboutSelf, MemoryAboutSelf, String);
store_key!(MemoryAboutUser, MemoryAboutUser, String);
store_key!(LongTermMemoryList, LongTermMemory, Vec<LongTermMemory>);
store_key!(ShortTermMemoryList, ShortTermMemory, Vec<ShortTermMemory>);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_strings_are_unique() {
        let keys: HashSet<&str> = StoreKeys::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(keys.len(), StoreKeys::ALL.len());
    }

    #[test]
    fn markers_point_at_their_variant() {
        assert_eq!(LongTermMemoryList::KEY.as_str(), "long_term_memory");
        assert_eq!(ShortTermMemoryList::KEY.as_str(), "short_term_memory");
        assert_eq!(MemoryAboutSelf::KEY.to_string(), "memory_about_self");
        assert_eq!(DefaultLive2d::KEY, StoreKeys::DefaultLive2d);
    }
}
