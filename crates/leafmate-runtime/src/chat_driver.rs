//! [`OllamaChat`] – streaming chat against a local Ollama server.
//!
//! Posts the conversation to Ollama's native `/api/chat` endpoint with
//! `stream: true` and decodes the NDJSON reply with
//! [`decode_ndjson`][crate::stream::decode_ndjson].  The configured system
//! prompt is always sent as the first message.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use leafmate_registry::ChatApi;
//! use leafmate_runtime::chat_driver::OllamaChat;
//! use leafmate_types::{ChatMessage, Role};
//!
//! # async fn run() -> Result<(), leafmate_types::LeafError> {
//! let chat = OllamaChat::new("http://localhost:11434", "qwen2.5:7b");
//! let mut reply = chat.chat(&[ChatMessage::new(Role::User, "你好")]).await?;
//! while let Some(chunk) = reply.next().await {
//!     print!("{}", chunk?.text);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use leafmate_registry::{ChatApi, ChatStream};
use leafmate_types::{ChatMessage, LeafError, Role};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::stream::decode_ndjson;

/// Model used when the configuration names none.
pub const DEFAULT_MODEL: &str = "qwen2.5:7b";

/// Persona sent as the system message of every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一个心理咨询师, 名叫小叶子. 请你以支持的, 非指导性的方式陪伴对方, \
帮助对方探索自己, 并在需要时提供帮助. 请不要回复长的和正式的内容, 避免说教, \
表现得像一个真实、专业、共情的心理咨询师. 再次提醒: 回复务必要简短!";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise before the reply stream starts.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("Ollama returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<LlmError> for LeafError {
    fn from(e: LlmError) -> Self {
        LeafError::Backend(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request shape
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// OllamaChat
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for Ollama's streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    base_url: String,
    model: String,
    system_prompt: String,
    client: reqwest::Client,
}

impl OllamaChat {
    /// Create a driver pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// using `model`, with [`DEFAULT_SYSTEM_PROMPT`] as the persona.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the persona sent as the system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Prepend the system prompt to `history`.  System messages already in
    /// `history` are dropped so the persona is sent exactly once.
    pub fn build_messages(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::new(Role::System, self.system_prompt.clone()))
            .chain(history.iter().filter(|m| m.role != Role::System).cloned())
            .collect()
    }

    /// Open the reply stream for `history`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the server cannot be reached, or
    /// [`LlmError::Api`] if it rejects the request.  Failures after the first
    /// byte are reported as `Err` items on the returned stream.
    #[instrument(skip(self, history), fields(model = %self.model, turns = history.len()))]
    pub async fn stream_chat(&self, history: &[ChatMessage]) -> Result<ChatStream, LlmError> {
        let messages = self.build_messages(history);
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: true,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }
        debug!(%url, "reply stream opened");
        Ok(decode_ndjson(response.bytes_stream()))
    }
}

#[async_trait]
impl ChatApi for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatStream, LeafError> {
        Ok(self.stream_chat(messages).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_prepended() {
        let chat = OllamaChat::new("http://localhost:11434", DEFAULT_MODEL);
        let built = chat.build_messages(&[ChatMessage::new(Role::User, "睡不着")]);
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].role, Role::System);
        assert_eq!(built[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(built[1].content, "睡不着");
    }

    #[test]
    fn caller_system_messages_are_not_duplicated() {
        let chat = OllamaChat::new("http://localhost:11434", DEFAULT_MODEL)
            .with_system_prompt("be brief");
        let built = chat.build_messages(&[
            ChatMessage::new(Role::System, "old persona"),
            ChatMessage::new(Role::User, "hi"),
        ]);
        let systems: Vec<_> = built.iter().filter(|m| m.role == Role::System).collect();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].content, "be brief");
    }

    #[test]
    fn request_body_uses_native_chat_shape() {
        let messages = [ChatMessage::new(Role::User, "hi")];
        let body = ChatRequest {
            model: DEFAULT_MODEL,
            messages: &messages,
            stream: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "qwen2.5:7b");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let chat = OllamaChat::new("http://localhost:11434/", DEFAULT_MODEL);
        assert_eq!(chat.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn unreachable_server_is_backend_error() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let chat = OllamaChat::new("http://127.0.0.1:9", DEFAULT_MODEL);
        let err = ChatApi::chat(&chat, &[ChatMessage::new(Role::User, "hi")])
            .await
            .err()
            .expect("request must fail");
        assert!(matches!(err, LeafError::Backend(_)));
    }
}
