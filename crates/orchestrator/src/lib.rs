//! Chat request orchestration for multi-tenant knowledge-base chatbots.
//!
//! The [`Orchestrator`] answers one user question for one chatbot:
//!
//! ```text
//! ChatRequest
//!      ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Validate, resolve session, look up chatbot              │
//! │         ↓                                                   │
//! │  2. Record user turn (background)                           │
//! │         ↓                                                   │
//! │  3. Match actions ── match ──→ execute, answer, done        │
//! │         ↓ no match                                          │
//! │  4. Embed query, retrieve context (tiered)                  │
//! │         ↓                                                   │
//! │  5. Assemble system prompt, load history window             │
//! │         ↓                                                   │
//! │  6. Completion: [system, ...history, user]                  │
//! │         ↓                                                   │
//! │  7. Record assistant turn (background), answer              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step after validation runs under one [`RequestDeadline`].
//!
//! # Example
//!
//! ```rust,no_run
//! use orchestrator::{ChatRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::from_env().await?;
//!
//!     let response = orchestrator
//!         .process(ChatRequest::new("What are your opening hours?", "support-bot"))
//!         .await?;
//!     println!("{} (session {})", response.answer, response.session_id);
//!
//!     orchestrator.flush().await;
//!     Ok(())
//! }
//! ```

mod config;
pub mod context;
mod corrections;
mod deadline;
mod error;
mod history;
mod orchestrator;
mod recorder;
pub mod retrieval;
mod store;

pub use config::{
    OrchestratorConfig, DEFAULT_ACTION_TIMEOUT, DEFAULT_MAX_QUERY_CHARS, DEFAULT_REQUEST_TIMEOUT,
};
pub use context::{build_system_prompt, PromptContext};
pub use corrections::{Correction, MAX_CORRECTION_CHARS};
pub use deadline::RequestDeadline;
pub use error::{OrchestratorError, StoreError};
pub use history::{HistorySettings, HistoryWindow};
pub use orchestrator::{
    AnswerSource, ChatRequest, ChatResponse, Orchestrator, OrchestratorBuilder,
    DEFAULT_DATABASE_URL,
};
pub use recorder::TurnRecorder;
pub use retrieval::{
    ChunkOrigin, RetrievalEngine, RetrievalResult, RetrievalSettings, RetrievedChunk,
};
pub use store::{ChatStore, KnowledgeWriter, SqliteStore, TextSearch, VectorIndex};
