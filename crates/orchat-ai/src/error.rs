//! Error types for orchat-ai

use thiserror::Error;

/// Result type alias using orchat-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the model-routing API.
///
/// The `Display` text of each variant is the message shown to the user in the
/// transcript, so it stays short and actionable. Lower-level detail is kept in
/// the variant fields and logged where the error is produced.
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure (connect, TLS, body read)
    #[error("Failed to get response from the AI model. Please try again.")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 401: the credential was rejected
    #[error("Invalid API key. Please check your OpenRouter API key.")]
    InvalidApiKey,

    /// 402: the account has no balance left
    #[error("Insufficient credits. Please check your OpenRouter account balance.")]
    InsufficientCredits,

    /// 429: too many requests
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited { retry_after: Option<u64> },

    /// 400: bad model id or message shape
    #[error("Invalid request. Please check your model selection and message format.")]
    BadRequest { message: String },

    /// Any other non-2xx response
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A streaming response arrived without a readable body
    #[error("Failed to get response from the AI model. Please try again.")]
    NoResponseBody,

    /// A buffered response carried no completion text
    #[error("No response generated.")]
    EmptyCompletion,

    /// Stream was aborted
    #[error("Request aborted")]
    Aborted,

    /// Invalid request parameters or client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a generic API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify a non-2xx HTTP status.
    ///
    /// `message` is the server-supplied `error.message`, if the body had one.
    pub fn from_status(status: u16, message: Option<String>, retry_after: Option<u64>) -> Self {
        match status {
            400 => Self::BadRequest {
                message: message.unwrap_or_default(),
            },
            401 => Self::InvalidApiKey,
            402 => Self::InsufficientCredits,
            429 => Self::RateLimited { retry_after },
            _ => Self::api(
                status,
                message.unwrap_or_else(|| format!("API request failed with status {}", status)),
            ),
        }
    }

    /// HTTP status this error was classified from, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::BadRequest { .. } => Some(400),
            Error::InvalidApiKey => Some(401),
            Error::InsufficientCredits => Some(402),
            Error::RateLimited { .. } => Some(429),
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error is about the credential rather than the request
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Error::InvalidApiKey | Error::InsufficientCredits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_known_codes() {
        assert!(matches!(Error::from_status(401, None, None), Error::InvalidApiKey));
        assert!(matches!(
            Error::from_status(402, Some("no money".into()), None),
            Error::InsufficientCredits
        ));
        assert!(matches!(
            Error::from_status(429, None, Some(7)),
            Error::RateLimited { retry_after: Some(7) }
        ));
        match Error::from_status(400, Some("bad model".into()), None) {
            Error::BadRequest { message } => assert_eq!(message, "bad model"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_from_status_generic_keeps_server_message() {
        let e = Error::from_status(503, Some("upstream overloaded".into()), None);
        assert_eq!(e.status(), Some(503));
        assert_eq!(e.to_string(), "upstream overloaded");
    }

    #[test]
    fn test_from_status_generic_without_message() {
        let e = Error::from_status(500, None, None);
        assert_eq!(e.to_string(), "API request failed with status 500");
    }

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            Error::InsufficientCredits.to_string(),
            "Insufficient credits. Please check your OpenRouter account balance."
        );
        assert_eq!(
            Error::RateLimited { retry_after: None }.to_string(),
            "Rate limit exceeded. Please try again in a moment."
        );
        assert_eq!(
            Error::BadRequest { message: "x".into() }.to_string(),
            "Invalid request. Please check your model selection and message format."
        );
    }

    #[test]
    fn test_status_round_trips_for_classified_errors() {
        for code in [400u16, 401, 402, 429, 418] {
            assert_eq!(Error::from_status(code, None, None).status(), Some(code));
        }
        assert_eq!(Error::Aborted.status(), None);
    }

    #[test]
    fn test_credential_errors() {
        assert!(Error::InvalidApiKey.is_credential_error());
        assert!(Error::InsufficientCredits.is_credential_error());
        assert!(!Error::RateLimited { retry_after: None }.is_credential_error());
        assert!(!Error::NoResponseBody.is_credential_error());
    }
}
