//! Echo brain implementation - replies with the last user message.

use async_trait::async_trait;
use brain_core::{Brain, BrainError, Completion, CompletionRequest, Role};

/// A simple brain that echoes the last user message back.
///
/// Useful for testing the request flow without any AI processing.
#[derive(Debug, Clone, Default)]
pub struct EchoBrain {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoBrain {
    /// Create a new EchoBrain with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoBrain with a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_brain::EchoBrain;
    ///
    /// let brain = EchoBrain::with_prefix("Echo: ");
    /// // Will respond with "Echo: <last user message>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl Brain for EchoBrain {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BrainError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let text = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, last_user),
            None => last_user.to_string(),
        };

        Ok(Completion::text(text))
    }

    fn name(&self) -> &str {
        "EchoBrain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::{ChatMessage, SamplingParams};

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            vec![
                ChatMessage::system("rules"),
                ChatMessage::user("first"),
                ChatMessage::assistant("reply"),
                ChatMessage::user("Hello!"),
            ],
            SamplingParams::default(),
        )
    }

    #[tokio::test]
    async fn test_echo_no_prefix() {
        let completion = EchoBrain::new().complete(request()).await.unwrap();
        assert_eq!(completion.answer(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_echo_with_prefix() {
        let completion = EchoBrain::with_prefix("Echo: ").complete(request()).await.unwrap();
        assert_eq!(completion.answer(), Some("Echo: Hello!"));
    }

    #[tokio::test]
    async fn test_brain_name() {
        assert_eq!(EchoBrain::new().name(), "EchoBrain");
    }
}
