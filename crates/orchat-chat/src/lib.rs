//! orchat-chat: chat session controller
//!
//! This crate owns the conversation transcript and drives each send through
//! a [`Transport`], applying streamed fragments to the transcript and
//! handling supersession, cancellation and errors.

pub mod controller;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod events;
pub mod handle;
pub mod transport;

pub use controller::{
    ChatConfig, ChatController, ChatSnapshot, DEMO_RESPONSES, ModelChange, NO_MODEL_MESSAGE,
    SendOutcome, SessionState,
};
pub use conversation::{Conversation, Message, MessageRole};
pub use credentials::{ApiKeyData, ApiKeyStatus, CredentialManager, KeyValueStore, MemoryStore};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::SessionHandle;
pub use transport::{ProviderTransport, RequestContext, Transport};
