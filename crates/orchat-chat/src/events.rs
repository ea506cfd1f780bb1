//! Controller event types

use orchat_ai::Model;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;

/// Events emitted as the conversation changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was appended to the transcript
    MessageAdded { message: Message },

    /// A fragment was appended to a streaming message
    MessageDelta { id: String, delta: String },

    /// A message's content was replaced (buffered reply or error text)
    MessageUpdated { message: Message },

    /// A message became the streaming target
    StreamStart { message_id: String },

    /// A message stopped being the streaming target
    StreamEnd { message_id: String },

    /// The loading flag flipped
    LoadingChanged { is_loading: bool },

    /// The selected model changed
    ModelChanged { model: Model },

    /// A model switch is waiting for confirmation
    ModelChangePending { model: Model },

    /// The transcript was cleared
    Cleared,

    /// A send failed; the text is also in the transcript
    Error { message: String },
}

impl ChatEvent {
    /// Check if this event ends a send
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatEvent::LoadingChanged { is_loading: false } | ChatEvent::Cleared
        )
    }
}
