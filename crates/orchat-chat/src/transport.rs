//! Transport abstraction for sending chat requests

use std::sync::Arc;

use async_trait::async_trait;
use orchat_ai::{
    ChatMessage, ChatProvider, Completion, CompletionMode, CompletionOptions, OpenRouterClient,
    Result,
};
use tokio_util::sync::CancellationToken;

use crate::conversation::{Message, MessageRole};

/// Everything one request needs
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub credential: String,
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

/// Build the outgoing message list for a send.
///
/// Takes the last `window` transcript entries preceding the new message,
/// skips entries with no content (e.g. a placeholder that never received
/// text), and appends the new message as a user turn. A system prompt, when
/// set, goes first.
pub fn build_context(
    history: &[Message],
    new_message: &str,
    window: usize,
    system_prompt: Option<&str>,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(window);
    let mut messages = Vec::with_capacity(history.len() - start + 2);

    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        messages.push(ChatMessage::system(prompt));
    }

    messages.extend(
        history[start..]
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| match m.role {
                MessageRole::User => ChatMessage::user(m.content.clone()),
                MessageRole::Assistant => ChatMessage::assistant(m.content.clone()),
            }),
    );
    messages.push(ChatMessage::user(new_message));
    messages
}

/// Transport for running chat requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request, buffered or streamed
    async fn send(
        &self,
        request: &RequestContext,
        mode: CompletionMode,
        cancel: CancellationToken,
    ) -> Result<Completion>;
}

/// Direct provider transport
pub struct ProviderTransport {
    provider: Arc<dyn ChatProvider>,
}

impl ProviderTransport {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Transport backed by an OpenRouter client
    pub fn openrouter(client: OpenRouterClient) -> Self {
        Self::new(Arc::new(client))
    }
}

impl Default for ProviderTransport {
    fn default() -> Self {
        Self::openrouter(OpenRouterClient::default())
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn send(
        &self,
        request: &RequestContext,
        mode: CompletionMode,
        cancel: CancellationToken,
    ) -> Result<Completion> {
        tracing::debug!(
            "Sending {} messages to {} ({:?})",
            request.messages.len(),
            request.model_id,
            mode
        );
        self.provider
            .complete_chat(
                &request.credential,
                &request.model_id,
                &request.messages,
                &request.options,
                mode,
                cancel,
            )
            .await
    }
}
