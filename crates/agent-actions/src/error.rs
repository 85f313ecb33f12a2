//! Error types for action execution.

use thiserror::Error;

/// Errors raised while rendering a JSON template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Stored template text is not valid JSON.
    #[error("template is not valid JSON: {0}")]
    InvalidJson(String),

    /// A secret placeholder had no value to substitute.
    #[error("unresolved secret placeholder: {0}")]
    UnresolvedSecret(String),

    /// Headers did not render to a JSON object.
    #[error("headers template must be a JSON object")]
    HeadersNotObject,
}

/// Errors that abort an action's execution.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A referenced secret is absent from the vault.
    #[error("Secret '{0}' not found in vault")]
    SecretNotFound(String),

    /// The vault itself could not be read.
    #[error("Vault unavailable: {0}")]
    Vault(String),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// The endpoint resolves to a private or internal address.
    #[error("Endpoint not allowed: {0}")]
    BlockedEndpoint(String),

    /// A redirect could not be followed.
    #[error("Redirect rejected: {0}")]
    Redirect(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("Endpoint returned status {0}")]
    Status(u16),

    /// The call did not finish within its deadline.
    #[error("Action timed out")]
    Timeout,
}
