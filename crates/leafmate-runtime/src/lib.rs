//! `leafmate-runtime` – the concrete capabilities and the conversation loop.
//!
//! # Modules
//!
//! - [`chat_driver`] – [`OllamaChat`][chat_driver::OllamaChat]: streaming
//!   chat against Ollama's `/api/chat`, with the companion persona sent as
//!   the system message.
//! - [`stream`] – [`decode_ndjson`][stream::decode_ndjson]: turns the NDJSON
//!   byte stream into ordered fragments ending in exactly one `done` event.
//! - [`speech`] – [`CommandSpeaker`][speech::CommandSpeaker]: speech output
//!   through an external TTS program.
//! - [`avatar`] – [`Live2dAvatar`][avatar::Live2dAvatar]: the built-in
//!   Live2D figures.
//! - [`apis`] – [`default_registry`][apis::default_registry] and persistence
//!   of the selected implementation per slot.
//! - [`session`] – [`ChatSession`][session::ChatSession]: one turn from user
//!   line to saved and spoken reply.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod apis;
pub mod avatar;
pub mod chat_driver;
pub mod session;
pub mod speech;
pub mod stream;
pub mod telemetry;

pub use apis::{ApiConfig, apply_saved_defaults, default_registry, select_and_persist};
pub use avatar::Live2dAvatar;
pub use chat_driver::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, LlmError, OllamaChat};
pub use session::{CancelHandle, ChatSession, TurnOutcome};
pub use speech::CommandSpeaker;
pub use telemetry::{TracerProviderGuard, init_tracing};
