//! Configuration file support

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use orchat_ai::{ClientConfig, CompletionOptions};
use orchat_chat::ChatConfig;
use serde::{Deserialize, Serialize};

/// Configuration for orchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model selected at startup
    pub model: Option<String>,
    /// Stream replies (default true)
    pub stream: Option<bool>,
    /// Transcript entries sent as context
    pub context_window: Option<usize>,
    /// System prompt sent before the conversation
    pub system_prompt: Option<String>,
    /// Demo-reply delay bounds in milliseconds
    pub demo_delay_ms: Option<[u64; 2]>,
    /// Sampling options
    #[serde(default)]
    pub completion: CompletionSettings,
    /// Endpoint settings
    #[serde(default)]
    pub api: ApiSettings,
}

/// Sampling option overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

/// Endpoint overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("orchat")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("ORCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some("openai/gpt-4o-mini".to_string()),
            stream: Some(true),
            context_window: Some(10),
            ..Config::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Endpoint configuration with overrides applied
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.api.base_url.clone().unwrap_or(defaults.base_url),
            referer: self.api.referer.clone().unwrap_or(defaults.referer),
            title: self.api.title.clone().unwrap_or(defaults.title),
        }
    }

    /// Controller configuration; `no_stream` comes from the command line
    pub fn chat_config(&self, no_stream: bool) -> ChatConfig {
        let defaults = ChatConfig::default();
        let options = CompletionOptions::default();

        let (demo_delay_min, demo_delay_max) = match self.demo_delay_ms {
            Some([min, max]) => (Duration::from_millis(min), Duration::from_millis(max)),
            None => (defaults.demo_delay_min, defaults.demo_delay_max),
        };

        ChatConfig {
            context_window: self.context_window.unwrap_or(defaults.context_window),
            stream: !no_stream && self.stream.unwrap_or(defaults.stream),
            options: CompletionOptions {
                max_tokens: self.completion.max_tokens.unwrap_or(options.max_tokens),
                temperature: self.completion.temperature.unwrap_or(options.temperature),
                top_p: self.completion.top_p.unwrap_or(options.top_p),
            },
            system_prompt: self.system_prompt.clone().filter(|p| !p.trim().is_empty()),
            demo_delay_min,
            demo_delay_max,
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# orchat configuration file
# Place at ~/.config/orchat/config.toml (Linux) or set ORCHAT_CONFIG_PATH

# Model selected at startup (any OpenRouter id)
model = "openai/gpt-4o-mini"

# Stream replies as they are generated
stream = true

# Number of previous messages sent with each request
context_window = 10

# Optional system prompt
# system_prompt = "You are a concise assistant."

# Delay range for demo replies when no valid API key is set
# demo_delay_ms = [1000, 2000]

[completion]
# max_tokens = 1000
# temperature = 0.7
# top_p = 1.0

[api]
# base_url = "https://openrouter.ai/api/v1"
# referer = "http://localhost"
# title = "orchat"

# The API key is not stored here; use `orchat --set-key <KEY>` or
# export OPENROUTER_API_KEY=sk-or-...
"#
}
