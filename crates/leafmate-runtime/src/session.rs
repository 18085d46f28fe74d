//! [`ChatSession`] – one conversational turn through the active capabilities.
//!
//! A turn reads the log from the active chat storage, saves the user's line,
//! streams the reply from the active chat backend, saves the reply and
//! finally speaks it.  The storage, backend and speaker are looked up from
//! the [`ApiRegistry`] on every turn, so a `/use` between turns takes effect
//! immediately.
//!
//! # Failure and cancellation
//!
//! - A backend error (before or during the stream) is returned.  The user's
//!   line is already saved; no partial reply is written.
//! - [`CancelHandle::cancel`] stops the running turn at whatever it is
//!   awaiting: the connect or the next fragment.  The partial reply is saved
//!   but not spoken.
//! - Speech errors are logged and never fail the turn.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use leafmate_registry::ApiRegistry;
use leafmate_types::{CapabilityKind, ChatMessage, LeafError, Role, ShortTermMemory};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Result of a completed or cancelled turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Reply text received, in full or up to the cancellation point.
    pub reply: String,
    pub cancelled: bool,
}

/// Cancels whichever turn is running on the owning [`ChatSession`].
///
/// Safe to call from a signal handler thread.  A cancel with no turn running
/// is dropped when the next turn starts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    turn: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner).cancel();
    }

    /// Install a fresh token for a new turn and return it.
    fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.turn.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }
}

/// Drives conversational turns and owns their cancel handle.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    cancel: CancelHandle,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run one turn for the user's `text`, calling `on_fragment` with each
    /// non-empty piece of the reply as it arrives.
    ///
    /// # Errors
    ///
    /// Returns the [`LeafError`] raised by the chat storage or chat backend.
    #[instrument(skip_all, fields(
        chat = registry.current_name(CapabilityKind::ChatCompletion),
        store = registry.current_name(CapabilityKind::ChatStorage),
    ))]
    pub async fn converse<F>(
        &self,
        registry: &ApiRegistry,
        text: &str,
        mut on_fragment: F,
    ) -> Result<TurnOutcome, LeafError>
    where
        F: FnMut(&str),
    {
        let token = self.cancel.begin_turn();
        let storage = registry.chat_storage();

        let mut log = storage.load_chat().await?;
        log.push(ShortTermMemory::new(Role::User, text));
        storage.save_chat(&log).await?;

        let messages: Vec<ChatMessage> = log.iter().map(ChatMessage::from).collect();
        let backend = registry.chat();
        let mut reply = String::new();
        let mut cancelled = false;

        let stream = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            stream = backend.chat(&messages) => Some(stream?),
        };

        if let Some(mut stream) = stream {
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    chunk = stream.next() => chunk,
                };
                let Some(chunk) = chunk else {
                    break;
                };
                let chunk = chunk?;
                if !chunk.text.is_empty() {
                    on_fragment(&chunk.text);
                    reply.push_str(&chunk.text);
                }
                if chunk.done {
                    break;
                }
            }
        } else {
            debug!("cancelled before the backend answered");
            cancelled = true;
        }

        if reply.is_empty() {
            warn!(cancelled, "empty reply not saved");
        } else {
            log.push(ShortTermMemory::new(Role::Assistant, reply.clone()));
            storage.save_chat(&log).await?;
        }
        info!(chars = reply.chars().count(), cancelled, "turn finished");

        if !cancelled && !reply.is_empty() {
            if let Some(speaker) = registry.speaker() {
                if let Err(e) = speaker.speak(&reply).await {
                    warn!(error = %e, "speech failed");
                }
            }
        }

        Ok(TurnOutcome { reply, cancelled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::stream;
    use leafmate_memory::SessionChatStorage;
    use leafmate_registry::{
        AvatarLoader, ChatApi, ChatStorage, ChatStream, DockedPosition, Live2dModel, Speaker,
    };
    use leafmate_types::ChatChunk;

    /// Replays a fixed script and records the messages it was sent.
    struct ScriptedChat {
        script: Vec<Result<ChatChunk, LeafError>>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl ScriptedChat {
        fn new(script: Vec<Result<ChatChunk, LeafError>>) -> Self {
            Self {
                script,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn replying(fragments: &[&str]) -> Self {
            let mut script: Vec<Result<ChatChunk, LeafError>> =
                fragments.iter().map(|f| Ok(ChatChunk::fragment(*f))).collect();
            script.push(Ok(ChatChunk::finished("")));
            Self::new(script)
        }
    }

    #[async_trait]
    impl ChatApi for ScriptedChat {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatStream, LeafError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            Ok(stream::iter(self.script.clone()).boxed())
        }
    }

    #[derive(Default)]
    struct RecordingSpeaker {
        spoken: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Speaker for RecordingSpeaker {
        async fn speak(&self, text: &str) -> Result<(), LeafError> {
            self.spoken.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(LeafError::Speech("no audio device".into()));
            }
            Ok(())
        }
    }

    /// Sends one fragment and then never yields again.
    struct StalledChat;

    #[async_trait]
    impl ChatApi for StalledChat {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<ChatStream, LeafError> {
            Ok(stream::iter(vec![Ok(ChatChunk::fragment("a"))])
                .chain(stream::pending())
                .boxed())
        }
    }

    /// Never finishes connecting.
    struct UnansweredChat;

    #[async_trait]
    impl ChatApi for UnansweredChat {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<ChatStream, LeafError> {
            futures_util::future::pending().await
        }
    }

    struct StillAvatar;

    impl AvatarLoader for StillAvatar {
        fn load(&self, mount: &str) -> Result<Live2dModel, LeafError> {
            Ok(Live2dModel {
                mount: mount.into(),
                model_path: "still.model3.json".into(),
                scale: 1.0,
                position: (0.0, 0.0),
                docked: DockedPosition::Left,
                mobile_display: false,
            })
        }
    }

    fn registry(
        chat: Arc<dyn ChatApi>,
        storage: Arc<SessionChatStorage>,
        speaker: Option<Arc<RecordingSpeaker>>,
    ) -> ApiRegistry {
        let mut registry = ApiRegistry::new("scripted", chat, "session", storage, "still", Arc::new(StillAvatar));
        if let Some(speaker) = speaker {
            registry.register_speaker("recorder", speaker);
            assert!(registry.select(CapabilityKind::SpeechSynthesis, "recorder"));
        }
        registry
    }

    #[tokio::test]
    async fn full_turn_saves_both_sides_and_speaks() {
        let chat = Arc::new(ScriptedChat::replying(&["你", "好", "!"]));
        let storage = Arc::new(SessionChatStorage::new());
        let speaker = Arc::new(RecordingSpeaker::default());
        let registry = registry(chat, storage.clone(), Some(speaker.clone()));

        let mut seen = Vec::new();
        let outcome = ChatSession::new()
            .converse(&registry, "嗨", |f| seen.push(f.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["你", "好", "!"]);
        assert_eq!(outcome, TurnOutcome { reply: "你好!".into(), cancelled: false });

        let log = storage.load_chat().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!((log[0].role, log[0].content.as_str()), (Role::User, "嗨"));
        assert_eq!((log[1].role, log[1].content.as_str()), (Role::Assistant, "你好!"));
        assert_eq!(*speaker.spoken.lock().unwrap(), vec!["你好!".to_string()]);
    }

    #[tokio::test]
    async fn earlier_turns_are_sent_as_history() {
        let chat = Arc::new(ScriptedChat::replying(&["嗯"]));
        let storage = Arc::new(SessionChatStorage::new());
        storage
            .save_chat(&[
                ShortTermMemory::new(Role::User, "第一句"),
                ShortTermMemory::new(Role::Assistant, "我在"),
            ])
            .await
            .unwrap();
        let registry = registry(chat.clone(), storage, None);

        ChatSession::new().converse(&registry, "第二句", |_| {}).await.unwrap();

        let seen = chat.seen.lock().unwrap();
        let contents: Vec<&str> = seen.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["第一句", "我在", "第二句"]);
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_only_user_turn() {
        let chat = Arc::new(ScriptedChat::new(vec![
            Ok(ChatChunk::fragment("部分")),
            Err(LeafError::Backend("connection reset".into())),
        ]));
        let storage = Arc::new(SessionChatStorage::new());
        let speaker = Arc::new(RecordingSpeaker::default());
        let registry = registry(chat, storage.clone(), Some(speaker.clone()));

        let err = ChatSession::new()
            .converse(&registry, "在吗", |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, LeafError::Backend("connection reset".into()));

        let log = storage.load_chat().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);
        assert!(speaker.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_keeps_partial_reply_unspoken() {
        let chat = Arc::new(ScriptedChat::replying(&["一", "二", "三"]));
        let storage = Arc::new(SessionChatStorage::new());
        let speaker = Arc::new(RecordingSpeaker::default());
        let registry = registry(chat, storage.clone(), Some(speaker.clone()));

        let session = ChatSession::new();
        let cancel = session.cancel_handle();
        let outcome = session
            .converse(&registry, "数数", |_| cancel.cancel())
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome { reply: "一".into(), cancelled: true });
        let log = storage.load_chat().await.unwrap();
        assert_eq!(log.last().unwrap().content, "一");
        assert!(speaker.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_interrupts_stalled_stream() {
        let storage = Arc::new(SessionChatStorage::new());
        let speaker = Arc::new(RecordingSpeaker::default());
        let registry = registry(Arc::new(StalledChat), storage.clone(), Some(speaker.clone()));

        let session = ChatSession::new();
        let cancel = session.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            session.converse(&registry, "hi", |_| {}),
        )
        .await
        .expect("turn returns after cancel")
        .unwrap();

        assert_eq!(outcome, TurnOutcome { reply: "a".into(), cancelled: true });
        let log = storage.load_chat().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content, "a");
        assert!(speaker.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_while_connecting_saves_only_user_turn() {
        let storage = Arc::new(SessionChatStorage::new());
        let registry = registry(Arc::new(UnansweredChat), storage.clone(), None);

        let session = ChatSession::new();
        let cancel = session.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            session.converse(&registry, "hi", |_| {}),
        )
        .await
        .expect("turn returns after cancel")
        .unwrap();

        assert_eq!(outcome, TurnOutcome { reply: String::new(), cancelled: true });
        assert_eq!(storage.load_chat().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_cancel_does_not_abort_next_turn() {
        let chat = Arc::new(ScriptedChat::replying(&["好"]));
        let storage = Arc::new(SessionChatStorage::new());
        let registry = registry(chat, storage, None);

        let session = ChatSession::new();
        session.cancel_handle().cancel();
        let outcome = session.converse(&registry, "hi", |_| {}).await.unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.reply, "好");
    }

    #[tokio::test]
    async fn speech_failure_does_not_fail_turn() {
        let chat = Arc::new(ScriptedChat::replying(&["ok"]));
        let storage = Arc::new(SessionChatStorage::new());
        let speaker = Arc::new(RecordingSpeaker {
            fail: true,
            ..RecordingSpeaker::default()
        });
        let registry = registry(chat, storage.clone(), Some(speaker.clone()));

        let outcome = ChatSession::new().converse(&registry, "hi", |_| {}).await.unwrap();
        assert_eq!(outcome.reply, "ok");
        assert_eq!(storage.load_chat().await.unwrap().len(), 2);
        assert_eq!(speaker.spoken.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_reply_is_not_saved() {
        let chat = Arc::new(ScriptedChat::replying(&[]));
        let storage = Arc::new(SessionChatStorage::new());
        let registry = registry(chat, storage.clone(), None);

        let outcome = ChatSession::new().converse(&registry, "hi", |_| {}).await.unwrap();
        assert!(outcome.reply.is_empty());
        assert_eq!(storage.load_chat().await.unwrap().len(), 1);
    }
}
