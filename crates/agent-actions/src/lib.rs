//! Tenant-configured actions for the chat orchestrator.
//!
//! An action maps trigger keywords to an outbound HTTP call whose headers
//! and body are JSON templates. This crate provides:
//!
//! - [`match_action`] - First-match-wins keyword selection
//! - [`resolve_secrets`] - Fail-closed lookup of `{{vault:name}}` references
//! - [`template`] - Placeholder substitution over parsed JSON
//! - [`ActionExecutor`] - Runs a matched action and turns the result into a reply
//! - [`ReqwestTransport`] - The production [`HttpTransport`]
//!
//! Failures while executing an action never surface as errors. They become
//! an [`ActionOutcome::Failed`] carrying an apology the caller can return.

mod action;
mod error;
mod executor;
mod matcher;
mod secrets;
mod ssrf;
pub mod template;
mod transport;

pub use action::{Action, HttpMethod, JsonTemplate};
pub use error::{ActionError, TemplateError};
pub use executor::{ActionExecutor, ActionOutcome};
pub use matcher::match_action;
pub use secrets::{resolve_secrets, SecretMap, SecretVault};
pub use template::{ResponseBody, TemplateContext};
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, ReqwestTransport};
