//! `leafmate-registry` – swappable capability implementations.
//!
//! # Modules
//!
//! - [`capability`] – the traits a chat backend ([`ChatApi`]), speech engine
//!   ([`Speaker`]), chat-history store ([`ChatStorage`]) and avatar
//!   ([`AvatarLoader`]) implement.
//! - [`slot`] – [`Slot`]: a never-empty, ordered list of named
//!   implementations with one active entry.
//! - [`registry`] – [`ApiRegistry`]: one slot per
//!   [`CapabilityKind`][leafmate_types::CapabilityKind], with name-based
//!   selection and typed accessors for the active implementation.

pub mod capability;
pub mod registry;
pub mod slot;

pub use capability::{
    AvatarLoader, ChatApi, ChatStorage, ChatStream, DockedPosition, Live2dModel, Speaker,
};
pub use registry::{ApiRegistry, SPEECH_OFF};
pub use slot::Slot;
