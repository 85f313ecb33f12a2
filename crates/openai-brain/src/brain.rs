//! OpenAiBrain implementation.

use std::time::Duration;

use brain_core::{async_trait, Brain, BrainError, Completion, CompletionRequest, Embedder};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse,
};
use crate::config::OpenAiBrainConfig;

/// A completion and embedding client for OpenAI-compatible APIs.
#[derive(Debug, Clone)]
pub struct OpenAiBrain {
    client: Client,
    config: OpenAiBrainConfig,
}

impl OpenAiBrain {
    /// Create a new OpenAiBrain with the given configuration.
    pub fn new(config: OpenAiBrainConfig) -> Result<Self, BrainError> {
        if config.api_key.is_empty() {
            return Err(BrainError::Configuration("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "OpenAiBrain initialized with chat model: {}, embedding model: {}",
            config.chat_model, config.embedding_model
        );

        Ok(Self { client, config })
    }

    /// Create an OpenAiBrain from environment variables.
    ///
    /// See [`OpenAiBrainConfig::from_env`] for required environment variables.
    pub fn from_env() -> Result<Self, BrainError> {
        Self::new(OpenAiBrainConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &OpenAiBrainConfig {
        &self.config
    }

    async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, BrainError> {
        let url = format!("{}{}", self.config.api_url, path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrainError::Timeout
                } else {
                    BrainError::Network(format!("Failed to send request: {}", e))
                }
            })?;

        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| BrainError::ProcessingFailed(format!("Failed to parse response: {}", e)))
    }
}

async fn check_status(response: Response) -> Result<Response, BrainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiError>(&error_text)
        .map(|api_error| api_error.error.message)
        .unwrap_or(error_text);

    if status.as_u16() == 429 || status.is_server_error() {
        return Err(BrainError::Unavailable(format!(
            "API error ({}): {}",
            status.as_u16(),
            detail
        )));
    }

    Err(BrainError::ProcessingFailed(format!(
        "API error ({}): {}",
        status.as_u16(),
        detail
    )))
}

#[async_trait]
impl Brain for OpenAiBrain {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BrainError> {
        let body = ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages: request.messages,
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
        };

        debug!(
            "Requesting completion: model={} messages={}",
            body.model,
            body.messages.len()
        );

        let response: ChatCompletionResponse = self.post("/v1/chat/completions", &body).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Completion usage: prompt={} total={}",
                usage.prompt_tokens, usage.total_tokens
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        Ok(Completion {
            content,
            model: response.model,
        })
    }

    fn name(&self) -> &str {
        "OpenAiBrain"
    }
}

#[async_trait]
impl Embedder for OpenAiBrain {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BrainError> {
        let body = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: text.to_string(),
            dimensions: self.config.embedding_dimensions,
        };

        let response: EmbeddingResponse = self.post("/v1/embeddings", &body).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| BrainError::ProcessingFailed("Embedding response was empty".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brain_name() {
        let brain = OpenAiBrain::new(OpenAiBrainConfig::builder().api_key("k").build()).unwrap();
        assert_eq!(brain.name(), "OpenAiBrain");
        assert_eq!(brain.config().chat_model, "gpt-4o");
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = OpenAiBrain::new(OpenAiBrainConfig::default());
        assert!(matches!(result, Err(BrainError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = OpenAiBrainConfig::builder()
            .api_key("k")
            .api_url("http://127.0.0.1:9")
            .timeout_secs(2)
            .build();
        let brain = OpenAiBrain::new(config).unwrap();

        let result = brain.embed("hello").await;
        assert!(matches!(result, Err(BrainError::Network(_)) | Err(BrainError::Timeout)));
    }
}
