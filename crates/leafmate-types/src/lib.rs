//! `leafmate-types` – records and vocabulary shared by every Leafmate crate.
//!
//! Nothing in here performs I/O. The persistence layer stores these records,
//! the registry names the [`CapabilityKind`] slots, and the runtime produces
//! [`ChatChunk`] events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single `{role, content}` turn handed to a chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One event of a streamed chat reply.
///
/// `text` is an incremental fragment, never the cumulative reply. Exactly one
/// event per stream carries `done == true`, and it is always the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub text: String,
    pub done: bool,
}

impl ChatChunk {
    /// A non-final fragment.
    pub fn fragment(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    /// The terminating event.
    pub fn finished(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory records
// ─────────────────────────────────────────────────────────────────────────────

/// One turn of the active conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortTermMemory {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ShortTermMemory {
    /// Record a turn stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl From<&ShortTermMemory> for ChatMessage {
    fn from(turn: &ShortTermMemory) -> Self {
        ChatMessage {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// A summarised window of a past conversation.
///
/// The id is serialised as `uuid` to stay compatible with existing
/// `data.json` documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermMemory {
    #[serde(rename = "uuid")]
    pub id: String,
    /// Window start, milliseconds since the Unix epoch.
    pub start: i64,
    /// Window end, milliseconds since the Unix epoch.
    pub end: i64,
    pub summary: String,
}

impl LongTermMemory {
    /// Display label `yy-M-d H:m:s - yy-M-d H:m:s` in local time.
    pub fn label(&self) -> String {
        self.label_in(&Local)
    }

    /// Display label rendered in the given time zone.
    pub fn label_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        format!(
            "{} - {}",
            format_millis(self.start, tz),
            format_millis(self.end, tz)
        )
    }
}

fn format_millis<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(utc) => utc
            .with_timezone(tz)
            .format("%y-%-m-%-d %-H:%-M:%-S")
            .to_string(),
        None => millis.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// The four swappable extension points of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    ChatCompletion,
    SpeechSynthesis,
    ChatStorage,
    AvatarLoader,
}

impl CapabilityKind {
    /// Every slot, in display order.
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::ChatCompletion,
        CapabilityKind::SpeechSynthesis,
        CapabilityKind::ChatStorage,
        CapabilityKind::AvatarLoader,
    ];

    /// Short name used on the command line.
    pub fn short_name(self) -> &'static str {
        match self {
            CapabilityKind::ChatCompletion => "chat",
            CapabilityKind::SpeechSynthesis => "speak",
            CapabilityKind::ChatStorage => "store",
            CapabilityKind::AvatarLoader => "live2d",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for CapabilityKind {
    type Err = LeafError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Ok(CapabilityKind::ChatCompletion),
            "speak" | "speech" => Ok(CapabilityKind::SpeechSynthesis),
            "store" | "storage" => Ok(CapabilityKind::ChatStorage),
            "live2d" | "avatar" => Ok(CapabilityKind::AvatarLoader),
            other => Err(LeafError::UnknownCapability(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures surfaced by capability implementations.
///
/// None of these are fatal; they are scoped to the user action that
/// triggered them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeafError {
    #[error("Chat backend failure: {0}")]
    Backend(String),

    #[error("Chat storage failure: {0}")]
    Storage(String),

    #[error("Speech synthesis failure: {0}")]
    Speech(String),

    #[error("Avatar loader failure: {0}")]
    Avatar(String),

    #[error("Unknown capability slot: {0}")]
    UnknownCapability(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::new(Role::Assistant, "hi")).unwrap();
        assert!(json.contains("\"assistant\""));
    }

    #[test]
    fn long_term_memory_id_is_stored_as_uuid() {
        let mem = LongTermMemory {
            id: "a1".into(),
            start: 0,
            end: 1,
            summary: "walked".into(),
        };
        let json = serde_json::to_value(&mem).unwrap();
        assert_eq!(json["uuid"], "a1");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn short_term_memory_reads_original_layout() {
        let raw = r#"{"role":"user","content":"你好","timestamp":1700000000000}"#;
        let turn: ShortTermMemory = serde_json::from_str(raw).unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.timestamp, 1_700_000_000_000);
        let msg = ChatMessage::from(&turn);
        assert_eq!(msg.content, "你好");
    }

    #[test]
    fn long_term_label_uses_unpadded_fields() {
        // 2024-03-05 07:08:09 UTC
        let start = 1_709_622_489_000;
        let mem = LongTermMemory {
            id: "x".into(),
            start,
            end: start + 3_600_000,
            summary: String::new(),
        };
        assert_eq!(mem.label_in(&Utc), "24-3-5 7:8:9 - 24-3-5 8:8:9");
    }

    #[test]
    fn capability_kind_parses_short_names() {
        for kind in CapabilityKind::ALL {
            assert_eq!(kind.short_name().parse::<CapabilityKind>().unwrap(), kind);
        }
        assert!(matches!(
            "teleport".parse::<CapabilityKind>(),
            Err(LeafError::UnknownCapability(_))
        ));
    }

    #[test]
    fn chunk_constructors_set_done_flag() {
        assert!(!ChatChunk::fragment("a").done);
        assert!(ChatChunk::finished("").done);
    }
}
