//! Error types for orchestrator operations.

use database::DatabaseError;
use brain_core::BrainError;
use thiserror::Error;

/// Errors from the relational store or the vector index.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The backing service could not be reached in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that end a chat request without an answer.
///
/// Anything that only degrades answer quality (missing history, a failed
/// retrieval tier, a failed action call) is logged instead of raised.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed or missing request fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Caller could not be authenticated.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Chatbot does not exist or is not accessible.
    #[error("{0} not found")]
    NotFound(String),

    /// Completion service answered without content.
    #[error("completion service returned no content")]
    CompletionEmpty,

    /// Completion service failed or timed out.
    #[error("completion service error: {0}")]
    CompletionService(#[from] BrainError),

    /// Required store read failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Orchestrator wiring is incomplete or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl OrchestratorError {
    /// HTTP-equivalent status class for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            OrchestratorError::InvalidRequest(_) => 400,
            OrchestratorError::Unauthenticated => 401,
            OrchestratorError::NotFound(_) => 404,
            OrchestratorError::CompletionEmpty
            | OrchestratorError::CompletionService(_)
            | OrchestratorError::Store(_)
            | OrchestratorError::Configuration(_) => 500,
        }
    }

    /// Message safe to show to the caller.
    ///
    /// Internal failures are reported generically; details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            OrchestratorError::InvalidRequest(_)
            | OrchestratorError::Unauthenticated
            | OrchestratorError::NotFound(_) => self.to_string(),
            OrchestratorError::CompletionEmpty => {
                "The assistant could not produce an answer. Please try again.".to_string()
            }
            _ => "An internal error occurred while processing the request.".to_string(),
        }
    }
}
