//! Executes a matched action and converts the result into a reply.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::action::Action;
use crate::error::ActionError;
use crate::secrets::{resolve_secrets, SecretMap, SecretVault};
use crate::template::{self, ResponseBody, TemplateContext};
use crate::transport::{HttpTransport, OutboundRequest, OutboundResponse};

/// Result of running an action. Both variants carry the text to show the user.
#[derive(Debug)]
pub enum ActionOutcome {
    Succeeded {
        action: String,
        message: String,
    },
    Failed {
        action: String,
        message: String,
        error: ActionError,
    },
}

impl ActionOutcome {
    pub fn message(&self) -> &str {
        match self {
            ActionOutcome::Succeeded { message, .. } | ActionOutcome::Failed { message, .. } => message,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            ActionOutcome::Succeeded { message, .. } | ActionOutcome::Failed { message, .. } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded { .. })
    }
}

fn status_apology(action: &str) -> String {
    format!(
        "I tried to perform the action '{}', but encountered an error.",
        action
    )
}

fn error_apology(action: &str, error: &ActionError) -> String {
    format!(
        "I encountered an unexpected error when trying to perform the action '{}'. Details: {}",
        action, error
    )
}

fn default_success(action: &str) -> String {
    format!("Okay, I have performed the action: {}.", action)
}

/// Runs actions against a secret vault and an HTTP transport.
#[derive(Clone)]
pub struct ActionExecutor {
    vault: Arc<dyn SecretVault>,
    transport: Arc<dyn HttpTransport>,
}

impl ActionExecutor {
    pub fn new(vault: Arc<dyn SecretVault>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { vault, transport }
    }

    /// Run `action`, finishing within `budget`.
    ///
    /// Never fails: secret, template, network, timeout, and non-2xx errors
    /// all produce [`ActionOutcome::Failed`] with an apology message.
    pub async fn execute(
        &self,
        action: &Action,
        context: &TemplateContext,
        budget: Duration,
    ) -> ActionOutcome {
        let deadline = Instant::now() + budget;
        info!(
            "Executing action '{}' ({} {})",
            action.name, action.method, action.url
        );

        match self.run(action, context, deadline).await {
            Ok(response) if response.is_success() => {
                let message = success_message(action, &response);
                info!("Action '{}' succeeded with status {}", action.name, response.status);
                ActionOutcome::Succeeded {
                    action: action.name.clone(),
                    message,
                }
            }
            Ok(response) => {
                warn!("Action '{}' endpoint returned status {}", action.name, response.status);
                ActionOutcome::Failed {
                    action: action.name.clone(),
                    message: status_apology(&action.name),
                    error: ActionError::Status(response.status),
                }
            }
            Err(error) => {
                warn!("Action '{}' aborted: {}", action.name, error);
                ActionOutcome::Failed {
                    action: action.name.clone(),
                    message: error_apology(&action.name, &error),
                    error,
                }
            }
        }
    }

    async fn run(
        &self,
        action: &Action,
        context: &TemplateContext,
        deadline: Instant,
    ) -> Result<OutboundResponse, ActionError> {
        let headers = action
            .headers_template
            .as_ref()
            .map(|t| t.parse())
            .transpose()?;
        let body = if action.method.sends_body() {
            action.body_template.as_ref().map(|t| t.parse()).transpose()?
        } else {
            None
        };

        let mut names = BTreeSet::new();
        for template in headers.iter().chain(body.iter()) {
            names.extend(template::secret_names(template));
        }

        let secrets = timeout_at(
            deadline,
            resolve_secrets(self.vault.as_ref(), &action.chatbot_id, &names),
        )
        .await
        .map_err(|_| ActionError::Timeout)??;

        let request = build_request(action, context, &secrets, headers, body, deadline)?;

        timeout_at(deadline, self.transport.send(request))
            .await
            .map_err(|_| ActionError::Timeout)?
    }
}

fn build_request(
    action: &Action,
    context: &TemplateContext,
    secrets: &SecretMap,
    headers: Option<Value>,
    body: Option<Value>,
    deadline: Instant,
) -> Result<OutboundRequest, ActionError> {
    let mut header_pairs = match headers {
        Some(template) => template::header_pairs(&template::render(&template, context, secrets)?)?,
        None => Vec::new(),
    };

    let body = body
        .map(|template| template::render(&template, context, secrets))
        .transpose()?
        .map(|rendered| rendered.to_string());

    if body.is_some()
        && !header_pairs
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
    {
        header_pairs.push(("Content-Type".to_string(), "application/json".to_string()));
    }

    Ok(OutboundRequest {
        method: action.method,
        url: action.url.clone(),
        headers: header_pairs,
        body,
        timeout: deadline.saturating_duration_since(Instant::now()),
    })
}

fn success_message(action: &Action, response: &OutboundResponse) -> String {
    match action
        .success_message_template
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        Some(template) => {
            template::render_response_message(template, &ResponseBody::parse(&response.body))
        }
        None => default_success(&action.name),
    }
}
