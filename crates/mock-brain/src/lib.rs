//! Mock brain implementations for testing the chat orchestrator.
//!
//! This crate provides test doubles for the `Brain` and `Embedder` traits:
//! - `EchoBrain` - Replies with the last user message
//! - `ScriptedBrain` - Replies with fixed text, nothing, or an error, and records requests
//! - `DelayedBrain` - Wraps another brain with artificial delay
//! - `FixedEmbedder` - Returns the same vector for every text
//!
//! For production use, see the `openai-brain` crate.
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{Brain, ChatMessage, CompletionRequest, SamplingParams, ScriptedBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let brain = ScriptedBrain::replying("Our return window is 30 days.");
//!     let request = CompletionRequest::new(vec![ChatMessage::user("returns?")], SamplingParams::default());
//!
//!     let completion = brain.complete(request).await?;
//!     assert_eq!(completion.answer(), Some("Our return window is 30 days."));
//!     assert_eq!(brain.call_count(), 1);
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod embedder;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{
    async_trait, Brain, BrainError, ChatMessage, Completion, CompletionRequest, Embedder, Role,
    SamplingParams,
};

pub use delayed::DelayedBrain;
pub use echo::EchoBrain;
pub use embedder::FixedEmbedder;
pub use scripted::ScriptedBrain;
