//! Conversation state: transcript, selected model, and streaming status.

use chrono::{DateTime, Utc};
use orchat_ai::Model;
use serde::{Deserialize, Serialize};

/// Who wrote a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// Conversation state owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// Transcript in send order
    pub messages: Vec<Message>,
    /// Model new sends go to
    pub selected_model: Option<Model>,
    /// Model waiting for the user to confirm a switch
    pub pending_model: Option<Model>,
    /// Assistant message currently receiving fragments
    pub streaming_message_id: Option<String>,
    /// Whether a reply is being waited on
    pub is_loading: bool,
}

impl Conversation {
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_get_unique_ids() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
        assert!(a.is_user());
        assert!(!Message::assistant("yo").is_user());
    }

    #[test]
    fn test_message_lookup() {
        let mut conversation = Conversation::default();
        let msg = Message::assistant("");
        let id = msg.id.clone();
        conversation.push(Message::user("q"));
        conversation.push(msg);

        conversation.message_mut(&id).unwrap().content.push_str("answer");
        assert_eq!(conversation.message(&id).unwrap().content, "answer");
        assert!(conversation.message("missing").is_none());
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_message_serializes_role_lowercase() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }
}
