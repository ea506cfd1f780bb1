//! OpenRouter chat-completions client

use async_trait::async_trait;
use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::ChatProvider;
use crate::{
    error::{Error, Result},
    stream::{FragmentStream, decode_stream},
    types::{ChatMessage, CompletionOptions, CreditInfo, KeyInfo, ModelInfo},
};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default value for the `HTTP-Referer` header
pub const DEFAULT_REFERER: &str = "http://localhost";

/// Default value for the `X-Title` header
pub const DEFAULT_TITLE: &str = "orchat";

/// Static request metadata for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash
    pub base_url: String,
    /// Origin identifier sent as `HTTP-Referer`
    pub referer: String,
    /// Application title sent as `X-Title`
    pub title: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// OpenRouter API client
///
/// Holds no credential; every call takes the key it should authenticate
/// with, so a key change never requires rebuilding the client.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl Default for OpenRouterClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl OpenRouterClient {
    /// Create a client with the given request metadata
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: ClientConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        }
    }

    /// Create a client pointed at a different API root
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::new(ClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// List every model the router exposes
    pub async fn list_models(&self, credential: &str) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.config.base_url);
        let request = self.client.get(&url).headers(self.headers(credential)?);
        let list: ModelList = self.send(request).await?.json().await?;
        tracing::debug!("Fetched {} models", list.data.len());
        Ok(list.data)
    }

    /// Fetch usage and limit details for a key
    pub async fn key_info(&self, credential: &str) -> Result<KeyInfo> {
        let url = format!("{}/auth/key", self.config.base_url);
        let request = self.client.get(&url).headers(self.headers(credential)?);
        let envelope: KeyEnvelope = self.send(request).await?.json().await?;
        Ok(envelope.data)
    }

    /// Fetch the credit summary for a key
    pub async fn credit_info(&self, credential: &str) -> Result<CreditInfo> {
        self.key_info(credential).await.map(CreditInfo::from)
    }

    fn headers(&self, credential: &str) -> Result<HeaderMap> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(Error::InvalidApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", credential))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("http-referer"),
            header_value(&self.config.referer)?,
        );
        headers.insert(HeaderName::from_static("x-title"), header_value(&self.config.title)?);
        Ok(headers)
    }

    /// Send a request and classify non-2xx responses
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.inspect_err(|e| {
            tracing::error!("Request to model router failed: {}", e);
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message);

        tracing::warn!(
            "Model router returned {}: {}",
            status.as_u16(),
            message.as_deref().unwrap_or(&body)
        );
        Err(Error::from_status(status.as_u16(), message, retry_after))
    }

    fn build_request<'a>(
        &self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
        stream: bool,
    ) -> Result<CompletionRequest<'a>> {
        if model_id.trim().is_empty() {
            return Err(Error::InvalidConfig("model id must not be empty".into()));
        }
        if messages.is_empty() {
            return Err(Error::InvalidConfig("at least one message is required".into()));
        }
        options.validate()?;

        Ok(CompletionRequest {
            model: model_id,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stream,
        })
    }

    fn completions_request(
        &self,
        credential: &str,
        body: &CompletionRequest<'_>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}/chat/completions", self.config.base_url);
        tracing::debug!(
            "POST {} (model: {}, messages: {}, stream: {})",
            url,
            body.model,
            body.messages.len(),
            body.stream
        );
        Ok(self
            .client
            .post(&url)
            .headers(self.headers(credential)?)
            .json(body))
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    async fn complete(
        &self,
        credential: &str,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let body = self.build_request(model_id, messages, options, false)?;
        let request = self.completions_request(credential, &body)?;
        let response: CompletionResponse = self.send(request).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or(Error::EmptyCompletion)
    }

    async fn stream(
        &self,
        credential: &str,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        let body = self.build_request(model_id, messages, options, true)?;
        let request = self.completions_request(credential, &body)?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            response = self.send(request) => response?,
        };

        if response.content_length() == Some(0) {
            return Err(Error::NoResponseBody);
        }

        Ok(decode_stream(response.bytes_stream(), cancel))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidConfig(format!("invalid header value: {}", e)))
}

// Request/Response types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct KeyEnvelope {
    #[serde(default)]
    data: KeyInfo,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}
