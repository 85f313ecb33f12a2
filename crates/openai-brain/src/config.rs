//! Configuration for OpenAiBrain.

use brain_core::BrainError;
use std::env;

/// Configuration for OpenAiBrain.
#[derive(Debug, Clone)]
pub struct OpenAiBrainConfig {
    /// API base URL (without `/v1`).
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Chat completion model.
    pub chat_model: String,

    /// Embedding model.
    pub embedding_model: String,

    /// Requested embedding dimensions, if the model supports shortening.
    pub embedding_dimensions: Option<u32>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAiBrainConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            embedding_dimensions: None,
            timeout_secs: 60,
        }
    }
}

impl OpenAiBrainConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - API URL (default: https://api.openai.com)
    /// - `OPENAI_CHAT_MODEL` - Chat model (default: gpt-4o)
    /// - `OPENAI_EMBEDDING_MODEL` - Embedding model (default: text-embedding-3-large)
    /// - `OPENAI_EMBEDDING_DIMENSIONS` - Embedding dimensions (default: model native)
    /// - `OPENAI_TIMEOUT_SECS` - Request timeout (default: 60)
    pub fn from_env() -> Result<Self, BrainError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| BrainError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        let defaults = Self::default();

        let api_url = env::var("OPENAI_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let chat_model = env::var("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model);

        let embedding_model =
            env::var("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model);

        let embedding_dimensions = env::var("OPENAI_EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse().ok());

        let timeout_secs = env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Ok(Self {
            api_url,
            api_key,
            chat_model,
            embedding_model,
            embedding_dimensions,
            timeout_secs,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> OpenAiBrainConfigBuilder {
        OpenAiBrainConfigBuilder::default()
    }
}

/// Builder for OpenAiBrainConfig.
#[derive(Debug, Default)]
pub struct OpenAiBrainConfigBuilder {
    config: OpenAiBrainConfig,
}

impl OpenAiBrainConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the chat model.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding dimensions.
    pub fn embedding_dimensions(mut self, dimensions: u32) -> Self {
        self.config.embedding_dimensions = Some(dimensions);
        self
    }

    /// Set the request timeout.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenAiBrainConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAiBrainConfig::default();

        assert_eq!(config.api_url, "https://api.openai.com");
        assert!(config.api_key.is_empty());
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.embedding_model, "text-embedding-3-large");
        assert_eq!(config.embedding_dimensions, None);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_builder_all_options() {
        let config = OpenAiBrainConfig::builder()
            .api_key("my-key")
            .api_url("http://localhost:11434")
            .chat_model("llama3")
            .embedding_model("nomic-embed-text")
            .embedding_dimensions(768)
            .timeout_secs(5)
            .build();

        assert_eq!(config.api_key, "my-key");
        assert_eq!(config.api_url, "http://localhost:11434");
        assert_eq!(config.chat_model, "llama3");
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert_eq!(config.embedding_dimensions, Some(768));
        assert_eq!(config.timeout_secs, 5);
    }

    // Environment-based tests are combined into a single test to avoid
    // race conditions when tests run in parallel (env vars are process-global).
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        fn clear_all_openai_vars() {
            for var in [
                "OPENAI_API_KEY",
                "OPENAI_API_URL",
                "OPENAI_CHAT_MODEL",
                "OPENAI_EMBEDDING_MODEL",
                "OPENAI_EMBEDDING_DIMENSIONS",
                "OPENAI_TIMEOUT_SECS",
            ] {
                std::env::remove_var(var);
            }
        }

        // Missing API key should error
        clear_all_openai_vars();
        match OpenAiBrainConfig::from_env() {
            Err(BrainError::Configuration(msg)) => assert!(msg.contains("OPENAI_API_KEY")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }

        // Only API key set, defaults used
        clear_all_openai_vars();
        std::env::set_var("OPENAI_API_KEY", "test-env-key");
        let config = OpenAiBrainConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test-env-key");
        assert_eq!(config.api_url, "https://api.openai.com");
        assert_eq!(config.chat_model, "gpt-4o");

        // Overrides, trailing slash trimmed, bad numbers ignored
        clear_all_openai_vars();
        std::env::set_var("OPENAI_API_KEY", "k");
        std::env::set_var("OPENAI_API_URL", "https://proxy.example.com/");
        std::env::set_var("OPENAI_CHAT_MODEL", "gpt-4o-mini");
        std::env::set_var("OPENAI_EMBEDDING_DIMENSIONS", "1536");
        std::env::set_var("OPENAI_TIMEOUT_SECS", "soon");
        let config = OpenAiBrainConfig::from_env().unwrap();
        assert_eq!(config.api_url, "https://proxy.example.com");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.embedding_dimensions, Some(1536));
        assert_eq!(config.timeout_secs, 60);

        clear_all_openai_vars();
    }
}
