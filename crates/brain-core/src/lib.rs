//! Core traits and types for language-model collaborators.
//!
//! This crate provides the shared interface between the chat orchestrator
//! and the services it calls out to. It defines:
//!
//! - [`Brain`] - A completion service turning role-tagged messages into text
//! - [`Embedder`] - An embedding service turning text into a vector
//! - [`ChatMessage`] / [`Role`] - Role-tagged conversation messages
//! - [`CompletionRequest`] / [`Completion`] - Completion input and output
//! - [`BrainError`] - Error types for both services
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, Brain, BrainError, Completion, CompletionRequest};
//!
//! struct FixedBrain;
//!
//! #[async_trait]
//! impl Brain for FixedBrain {
//!     async fn complete(&self, _request: CompletionRequest) -> Result<Completion, BrainError> {
//!         Ok(Completion::text("Hello!"))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "FixedBrain"
//!     }
//! }
//! ```

mod error;
mod message;
mod prompt;
mod trait_def;

pub use error::BrainError;
pub use message::{ChatMessage, Completion, CompletionRequest, Role, SamplingParams};
pub use prompt::hash_prompt;
pub use trait_def::{Brain, Embedder};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
