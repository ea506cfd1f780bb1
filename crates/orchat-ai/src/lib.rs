//! orchat-ai: OpenRouter transport layer
//!
//! This crate provides the HTTP client for the model-routing API, the
//! incremental decoder for streamed completions, and the catalog and key
//! validation helpers built on top of them.

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use providers::{ChatProvider, Completion, openrouter::{ClientConfig, OpenRouterClient}};
pub use stream::{FragmentStream, FrameDecoder, StreamEvent};
pub use types::*;
