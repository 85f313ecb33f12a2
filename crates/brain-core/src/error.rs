//! Error types for completion and embedding services.

use thiserror::Error;

/// Errors that can occur while calling a language-model service.
#[derive(Debug, Error)]
pub enum BrainError {
    /// The service is temporarily unavailable.
    #[error("brain unavailable: {0}")]
    Unavailable(String),

    /// The request reached the service but could not be processed.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// The service could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The client is misconfigured (missing key, bad URL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A timeout occurred during processing.
    #[error("processing timed out")]
    Timeout,
}
