//! OpenAI API request and response types.

use brain_core::ChatMessage;
use serde::{Deserialize, Serialize};

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Response choices
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token usage
    pub usage: Option<Usage>,
}

/// A response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The message
    pub message: ResponseMessage,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// Response message.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Content (may be null)
    pub content: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: Option<u32>,
    pub total_tokens: u32,
}

/// Embedding request.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
}

/// Embedding response.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

/// One embedding vector.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ApiErrorDetails,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetails {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage::system("rules"), ChatMessage::user("hi")],
            max_tokens: 500,
            temperature: 0.3,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0], json!({"role": "system", "content": "rules"}));
        assert_eq!(value["max_tokens"], json!(500));
    }

    #[test]
    fn test_null_content_parses() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "x",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": null}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert!(response.choices[0].message.content.is_none());
    }

    #[test]
    fn test_embedding_request_omits_unset_dimensions() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-large".to_string(),
            input: "hello".to_string(),
            dimensions: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("dimensions").is_none());
    }
}
