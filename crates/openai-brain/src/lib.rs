//! OpenAI-compatible brain implementation.
//!
//! [`OpenAiBrain`] implements both [`brain_core::Brain`] (chat completions)
//! and [`brain_core::Embedder`] (embeddings) against any server exposing the
//! `/v1/chat/completions` and `/v1/embeddings` endpoints.
//!
//! ```rust,no_run
//! use brain_core::{Brain, ChatMessage, CompletionRequest, SamplingParams};
//! use openai_brain::OpenAiBrain;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = OpenAiBrain::from_env()?;
//!     let request = CompletionRequest::new(
//!         vec![ChatMessage::user("Hello")],
//!         SamplingParams::default(),
//!     );
//!     let completion = brain.complete(request).await?;
//!     println!("{:?}", completion.answer());
//!     Ok(())
//! }
//! ```

pub mod api_types;
mod brain;
mod config;

pub use brain::OpenAiBrain;
pub use config::{OpenAiBrainConfig, OpenAiBrainConfigBuilder};
