//! API key validation

use crate::error::Error;
use crate::providers::openrouter::OpenRouterClient;
use crate::types::KeyInfo;

/// Prefix every OpenRouter key starts with
pub const KEY_PREFIX: &str = "sk-or-";

/// Outcome of validating a key.
///
/// Validation failures are ordinary results carrying a status string, not
/// errors: the caller keeps whatever key state it had before.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValidation {
    pub is_valid: bool,
    pub error: Option<String>,
    pub key_info: Option<KeyInfo>,
}

impl KeyValidation {
    fn valid(key_info: KeyInfo) -> Self {
        Self {
            is_valid: true,
            error: None,
            key_info: Some(key_info),
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            key_info: None,
        }
    }
}

/// Local shape check; no network
pub fn check_format(key: &str) -> std::result::Result<(), String> {
    let key = key.trim();
    if key.is_empty() {
        return Err("API key is required".to_string());
    }
    if !key.starts_with(KEY_PREFIX) {
        return Err(format!(
            "Invalid API key format. OpenRouter keys should start with '{}'",
            KEY_PREFIX
        ));
    }
    Ok(())
}

/// Check the key's format, then ask the router whether it accepts it
pub async fn validate_key(client: &OpenRouterClient, key: &str) -> KeyValidation {
    if let Err(message) = check_format(key) {
        return KeyValidation::invalid(message);
    }

    match client.key_info(key.trim()).await {
        Ok(info) => KeyValidation::valid(info),
        Err(e) => {
            tracing::debug!("Key validation failed: {:?}", e);
            KeyValidation::invalid(validation_message(&e))
        }
    }
}

fn validation_message(error: &Error) -> String {
    match error {
        Error::InvalidApiKey => "Invalid API key".to_string(),
        Error::RateLimited { .. } => "Rate limited. Please try again later.".to_string(),
        Error::Http(e) if e.status().is_none() => format!("Network error: {}", e),
        e if e.status().is_some() => format!("API error: {}", e),
        _ => "Failed to validate API key. Please check your connection.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_format() {
        assert_eq!(check_format("  "), Err("API key is required".to_string()));
        assert!(check_format("sk-abc").unwrap_err().contains("sk-or-"));
        assert!(check_format(" sk-or-v1-abc ").is_ok());
    }

    #[tokio::test]
    async fn test_bad_format_skips_network() {
        let client = OpenRouterClient::with_base_url("http://127.0.0.1:9");
        let result = validate_key(&client, "not-a-key").await;
        assert!(!result.is_valid);
        assert!(result.error.unwrap().starts_with("Invalid API key format"));
    }

    #[tokio::test]
    async fn test_valid_key() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/auth/key")
            .match_header("authorization", "Bearer sk-or-good")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"label":"personal","usage":0.5,"limit":null,"is_free_tier":false}}"#)
            .create_async()
            .await;

        let client = OpenRouterClient::with_base_url(server.url());
        let result = validate_key(&client, "sk-or-good").await;
        assert!(result.is_valid);
        assert!(result.error.is_none());
        assert_eq!(result.key_info.unwrap().label.as_deref(), Some("personal"));
    }

    #[tokio::test]
    async fn test_rejected_key() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/auth/key")
            .with_status(401)
            .create_async()
            .await;

        let client = OpenRouterClient::with_base_url(server.url());
        let result = validate_key(&client, "sk-or-bad").await;
        assert_eq!(result, KeyValidation::invalid("Invalid API key"));
    }

    #[tokio::test]
    async fn test_rate_limited_and_other_statuses() {
        let mut server = mockito::Server::new_async().await;
        let _limited = server
            .mock("GET", "/auth/key")
            .match_header("authorization", "Bearer sk-or-busy")
            .with_status(429)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/auth/key")
            .match_header("authorization", "Bearer sk-or-broken")
            .with_status(500)
            .with_body(r#"{"error":{"message":"Internal"}}"#)
            .create_async()
            .await;

        let client = OpenRouterClient::with_base_url(server.url());
        let busy = validate_key(&client, "sk-or-busy").await;
        assert_eq!(busy.error.as_deref(), Some("Rate limited. Please try again later."));

        let broken = validate_key(&client, "sk-or-broken").await;
        assert_eq!(broken.error.as_deref(), Some("API error: Internal"));
    }

    #[tokio::test]
    async fn test_network_error() {
        let client = OpenRouterClient::with_base_url("http://127.0.0.1:9");
        let result = validate_key(&client, "sk-or-offline").await;
        assert!(!result.is_valid);
        assert!(result.error.unwrap().starts_with("Network error:"));
    }
}
