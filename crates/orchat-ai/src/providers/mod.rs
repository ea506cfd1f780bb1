//! Chat-completion provider implementations

pub mod openrouter;

use crate::{
    ChatMessage, CompletionMode, CompletionOptions, Error, Result, stream::FragmentStream,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Result of [`ChatProvider::complete_chat`]
pub enum Completion {
    /// Full reply text from a buffered request
    Text(String),
    /// Fragment stream from a streaming request
    Stream(FragmentStream),
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Trait for chat-completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue one buffered request and return the first completion's text
    async fn complete(
        &self,
        credential: &str,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String>;

    /// Issue one streaming request and return its decoded fragments
    async fn stream(
        &self,
        credential: &str,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<FragmentStream>;

    /// Dispatch on `mode`
    async fn complete_chat(
        &self,
        credential: &str,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        mode: CompletionMode,
        cancel: CancellationToken,
    ) -> Result<Completion> {
        match mode {
            CompletionMode::Buffered => self
                .complete(credential, model_id, messages, options)
                .await
                .map(Completion::Text),
            CompletionMode::Streaming => self
                .stream(credential, model_id, messages, options, cancel)
                .await
                .map(Completion::Stream),
        }
    }
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var(env_var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(Error::InvalidApiKey)
}
