//! The action model.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::TemplateError;

/// HTTP methods an action may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// GET requests never carry a body.
    pub fn sends_body(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

/// Stored JSON template text, parsed only when an action runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonTemplate(String);

impl JsonTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the template text into a JSON tree.
    pub fn parse(&self) -> Result<Value, TemplateError> {
        serde_json::from_str(&self.0).map_err(|e| TemplateError::InvalidJson(e.to_string()))
    }
}

impl From<Value> for JsonTemplate {
    fn from(value: Value) -> Self {
        Self(value.to_string())
    }
}

/// A tenant-configured action.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    pub chatbot_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Matched case-insensitively as substrings of the query.
    pub trigger_keywords: Vec<String>,
    pub method: HttpMethod,
    pub url: String,
    pub headers_template: Option<JsonTemplate>,
    pub body_template: Option<JsonTemplate>,
    /// May reference `{{response.<key>}}`.
    pub success_message_template: Option<String>,
    pub is_active: bool,
}

impl Action {
    /// Create an active action with no keywords or templates.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        method: HttpMethod,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chatbot_id: String::new(),
            name: name.into(),
            description: None,
            trigger_keywords: Vec::new(),
            method,
            url: url.into(),
            headers_template: None,
            body_template: None,
            success_message_template: None,
            is_active: true,
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trigger_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_headers(mut self, template: impl Into<JsonTemplate>) -> Self {
        self.headers_template = Some(template.into());
        self
    }

    pub fn with_body(mut self, template: impl Into<JsonTemplate>) -> Self {
        self.body_template = Some(template.into());
        self
    }

    pub fn with_success_message(mut self, template: impl Into<String>) -> Self {
        self.success_message_template = Some(template.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether any non-blank keyword occurs in the lowercased query.
    pub(crate) fn is_triggered_by(&self, query_lower: &str) -> bool {
        self.trigger_keywords.iter().any(|keyword| {
            let keyword = keyword.trim().to_lowercase();
            !keyword.is_empty() && query_lower.contains(&keyword)
        })
    }
}
