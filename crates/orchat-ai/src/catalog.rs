//! Model catalog: filtering the router's model list down to chat models.

use crate::providers::openrouter::OpenRouterClient;
use crate::types::{Model, ModelInfo, provider_prefix};

/// Provider prefixes offered in the catalog
pub const ALLOWED_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "google",
    "deepseek",
    "mistralai",
    "xai",
];

/// Id fragments that mark non-chat models (embeddings, audio, image)
const EXCLUDED_KEYWORDS: &[&str] = &[
    "embedding",
    "embed",
    "whisper",
    "audio",
    "vision",
    "image",
    "dall-e",
    "midjourney",
];

/// Maximum number of models kept after filtering
pub const MAX_CATALOG_SIZE: usize = 100;

/// Outcome of loading the catalog.
///
/// Loading never fails outright: a fetch error falls back to a short static
/// list and the error text is kept for display.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub models: Vec<Model>,
    pub error: Option<String>,
}

/// Display label for a provider prefix
pub fn provider_display_name(prefix: &str) -> String {
    match prefix.to_lowercase().as_str() {
        "openai" => "OpenAI".to_string(),
        "anthropic" => "Anthropic".to_string(),
        "google" => "Google".to_string(),
        "deepseek" => "DeepSeek".to_string(),
        "mistralai" => "Mistral".to_string(),
        "xai" => "Grok (xAI)".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Whether a router id belongs to an allowed provider and looks like a chat model
pub fn is_chat_model(id: &str) -> bool {
    let lower = id.to_lowercase();
    ALLOWED_PROVIDERS.contains(&provider_prefix(&lower))
        && !EXCLUDED_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Convert a router catalog entry into a selectable model
pub fn to_model(info: &ModelInfo) -> Model {
    Model {
        id: info.id.clone(),
        name: info.name.clone(),
        provider: provider_display_name(provider_prefix(&info.id)),
    }
}

/// Filter, sort (provider, then name) and cap the router's model list.
pub fn filter_models(models: Vec<ModelInfo>) -> Vec<Model> {
    let mut chat: Vec<ModelInfo> = models.into_iter().filter(|m| is_chat_model(&m.id)).collect();

    chat.sort_by(|a, b| {
        provider_prefix(&a.id)
            .cmp(provider_prefix(&b.id))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    chat.iter().take(MAX_CATALOG_SIZE).map(to_model).collect()
}

/// Models offered when no validated key is available
pub fn default_models() -> Vec<Model> {
    vec![
        Model::new("openai/gpt-4o", "GPT-4o", "OpenAI"),
        Model::new("openai/gpt-4o-mini", "GPT-4o Mini", "OpenAI"),
        Model::new("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", "Anthropic"),
        Model::new("anthropic/claude-3-haiku", "Claude 3 Haiku", "Anthropic"),
        Model::new("google/gemini-pro-1.5", "Gemini Pro 1.5", "Google"),
        Model::new("deepseek/deepseek-chat", "DeepSeek Chat", "DeepSeek"),
        Model::new("mistralai/mistral-large", "Mistral Large", "Mistral"),
        Model::new("xai/grok-beta", "Grok Beta", "Grok (xAI)"),
    ]
}

/// Models offered when fetching the catalog failed
pub fn fallback_models() -> Vec<Model> {
    vec![
        Model::new("openai/gpt-4o", "GPT-4o", "OpenAI"),
        Model::new("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", "Anthropic"),
        Model::new("google/gemini-pro-1.5", "Gemini Pro 1.5", "Google"),
        Model::new("deepseek/deepseek-chat", "DeepSeek Chat", "DeepSeek"),
    ]
}

/// Load the catalog for a key.
///
/// `None` (no validated key) returns [`default_models`] without a network call.
pub async fn load_models(client: &OpenRouterClient, credential: Option<&str>) -> Catalog {
    let Some(credential) = credential else {
        return Catalog {
            models: default_models(),
            error: None,
        };
    };

    match client.list_models(credential).await {
        Ok(models) => {
            let total = models.len();
            let models = filter_models(models);
            tracing::debug!("Catalog: kept {} of {} models", models.len(), total);
            Catalog {
                models,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!("Failed to fetch models, using fallback list: {}", e);
            Catalog {
                models: fallback_models(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Look up a model by exact id, then partial id, then partial name
pub fn find_model(query: &str, models: &[Model]) -> Option<Model> {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return None;
    }

    // Exact match first
    if let Some(model) = models.iter().find(|m| m.id.to_lowercase() == query_lower) {
        return Some(model.clone());
    }

    // Partial match
    if let Some(model) = models
        .iter()
        .find(|m| m.id.to_lowercase().contains(&query_lower))
    {
        return Some(model.clone());
    }

    // Match by name
    models
        .iter()
        .find(|m| m.name.to_lowercase().contains(&query_lower))
        .cloned()
}
