//! The capability traits every swappable implementation must satisfy.
//!
//! - [`ChatApi`] – streams a reply for a conversation.
//! - [`Speaker`] – reads text aloud.
//! - [`ChatStorage`] – loads, saves and deletes the active conversation.
//! - [`AvatarLoader`] – produces the [`Live2dModel`] a rendering shell mounts.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use leafmate_types::{ChatChunk, ChatMessage, LeafError, ShortTermMemory};
use serde::{Deserialize, Serialize};

/// A lazy, single-pass sequence of reply fragments.
///
/// Items arrive in order; the last `Ok` item has `done == true`. An `Err`
/// item ends the stream and does not retract fragments already yielded.
/// Dropping the stream abandons the underlying request.
pub type ChatStream = BoxStream<'static, Result<ChatChunk, LeafError>>;

/// A chat completion backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Start a streamed reply to `messages`.
    ///
    /// `messages` never contains the system instruction; implementations add
    /// their own.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatStream, LeafError>;
}

/// Text-to-speech output.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), LeafError>;
}

/// Persistence of the active conversation log.
#[async_trait]
pub trait ChatStorage: Send + Sync {
    /// Returns an empty log when nothing was saved yet.
    async fn load_chat(&self) -> Result<Vec<ShortTermMemory>, LeafError>;
    async fn save_chat(&self, chat: &[ShortTermMemory]) -> Result<(), LeafError>;
    async fn delete_chat(&self) -> Result<(), LeafError>;
}

/// Which screen edge the avatar docks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockedPosition {
    Left,
    Right,
}

/// Everything a Live2D renderer needs to mount one figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Live2dModel {
    /// Identifier of the element the figure is mounted into.
    pub mount: String,
    /// Path of the `.model3.json` asset.
    pub model_path: String,
    pub scale: f32,
    /// Offset in pixels from the docked corner.
    pub position: (f32, f32),
    pub docked: DockedPosition,
    pub mobile_display: bool,
}

/// Produces the avatar description for a mounting element.
///
/// There is no teardown hook: the rendering library offers none, so a
/// mounted figure lives until its host element is discarded.
pub trait AvatarLoader: Send + Sync {
    fn load(&self, mount: &str) -> Result<Live2dModel, LeafError>;
}
