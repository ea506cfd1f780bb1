//! Core types for chat-completion requests

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Roles accepted by the chat-completions endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Get the role as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A role/content pair as sent on the wire
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

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sampling options for a completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Nucleus sampling (0.0 exclusive - 1.0)
    pub top_p: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

impl CompletionOptions {
    /// Reject values the endpoint would refuse anyway
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::InvalidConfig("max_tokens must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidConfig(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "top_p must be within (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// How a completion should be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Wait for the whole body
    Buffered,
    /// Incremental delivery over server-sent events
    #[default]
    Streaming,
}

/// A model the user can pick: identifier plus display metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    /// Routing identifier (e.g., "openai/gpt-4o")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Provider display label (e.g., "OpenAI")
    pub provider: String,
}

impl Model {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
        }
    }

    /// The provider prefix of the id ("openai" for "openai/gpt-4o")
    pub fn provider_prefix(&self) -> &str {
        provider_prefix(&self.id)
    }
}

/// The part of a routing id before the first '/'
pub fn provider_prefix(id: &str) -> &str {
    id.split('/').next().unwrap_or(id)
}

/// Per-token pricing as reported by `/models` (decimal strings, USD)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub prompt: Option<String>,
    pub completion: Option<String>,
}

/// Catalog entry returned from `/models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub context_length: Option<u64>,
}

/// Rate limit block inside `/auth/key`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    pub requests: Option<u32>,
    pub interval: Option<String>,
    pub requests_per_minute: Option<u32>,
}

/// Key details returned from `/auth/key`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyInfo {
    pub label: Option<String>,
    pub usage: Option<f64>,
    pub limit: Option<f64>,
    pub is_free_tier: Option<bool>,
    pub rate_limit: Option<RateLimit>,
}

/// Credit summary derived from [`KeyInfo`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditInfo {
    pub balance: f64,
    pub limit: f64,
    pub usage_this_month: f64,
    pub label: String,
    pub is_unlimited: bool,
    pub rate_limit_per_minute: Option<u32>,
}

impl From<KeyInfo> for CreditInfo {
    fn from(info: KeyInfo) -> Self {
        let usage = info.usage.unwrap_or(0.0);
        Self {
            balance: usage,
            limit: info.limit.unwrap_or(0.0),
            usage_this_month: usage,
            label: info.label.unwrap_or_else(|| "API Key".to_string()),
            is_unlimited: info.is_free_tier == Some(false) && info.limit.is_none(),
            rate_limit_per_minute: info.rate_limit.and_then(|r| r.requests_per_minute),
        }
    }
}

impl CreditInfo {
    /// Share of the limit used so far, clamped to 0..=100
    pub fn usage_percentage(&self) -> f64 {
        if self.is_unlimited || self.limit <= 0.0 {
            return 0.0;
        }
        (self.usage_this_month / self.limit * 100.0).min(100.0)
    }

    /// Credit left before hitting the limit; `None` when unlimited
    pub fn remaining(&self) -> Option<f64> {
        if self.is_unlimited {
            return None;
        }
        Some((self.limit - self.usage_this_month).max(0.0))
    }
}
