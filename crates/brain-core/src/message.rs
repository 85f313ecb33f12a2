//! Message and completion types shared by all brain implementations.

use serde::{Deserialize, Serialize};

/// The author of a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// Temperature for generation (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens for the response.
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// Input to [`crate::Brain::complete`].
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, sampling: SamplingParams) -> Self {
        Self { messages, sampling }
    }

    /// The system prompt, if the first message is a system message.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Output of a completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Generated text, if the service produced any.
    pub content: Option<String>,
    /// Model that produced the completion, when reported.
    pub model: Option<String>,
}

impl Completion {
    /// A completion carrying the given text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            model: None,
        }
    }

    /// A completion with no content.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The generated text, or `None` if it is missing or blank.
    pub fn answer(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}
