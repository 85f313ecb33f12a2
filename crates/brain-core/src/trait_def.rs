//! The Brain and Embedder trait definitions.

use async_trait::async_trait;

use crate::error::BrainError;
use crate::message::{Completion, CompletionRequest};

/// A completion service that generates text from a role-tagged message sequence.
///
/// This trait is object-safe and can be used with `Arc<dyn Brain>`.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Generate a completion for the given messages and sampling parameters.
    ///
    /// A successful call may still carry no content; callers decide whether
    /// that is an error.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BrainError>;

    /// Get a human-readable name for this brain implementation.
    fn name(&self) -> &str;
}

/// An embedding service producing a fixed-dimension vector for a text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BrainError>;
}
