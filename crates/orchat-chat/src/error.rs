//! Error types for orchat-chat

use thiserror::Error;

/// Result type alias using orchat-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside a send.
///
/// Failures during a send never surface here; they are written into the
/// transcript as the assistant's reply.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the transport layer
    #[error(transparent)]
    Ai(#[from] orchat_ai::Error),

    /// Reading or writing the key store failed
    #[error("Key storage error: {0}")]
    Storage(String),

    /// A stored value could not be encoded
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the underlying transport rejected the credential
    pub fn is_credential_error(&self) -> bool {
        match self {
            Error::Ai(e) => e.is_credential_error(),
            _ => false,
        }
    }
}
