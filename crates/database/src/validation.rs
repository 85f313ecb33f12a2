//! Input validation for tenant-configured actions.

use std::fmt;

use crate::models::ActionRecord;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty value where one is required.
    Empty(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// HTTP method outside the supported set.
    InvalidMethod(String),
    /// URL is not an absolute http(s) URL.
    InvalidUrl(String),
    /// Template text is not valid JSON.
    InvalidTemplate { field: String, message: String },
    /// An active action has no usable trigger keyword.
    NoTriggerKeywords(String),
    /// Correction text does not start with the correction marker.
    MissingCorrectionMarker,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::InvalidMethod(method) => {
                write!(f, "Unsupported HTTP method: {}", method)
            }
            ValidationError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            ValidationError::InvalidTemplate { field, message } => {
                write!(f, "{} is not valid JSON: {}", field, message)
            }
            ValidationError::NoTriggerKeywords(name) => {
                write!(f, "Active action '{}' has no trigger keywords", name)
            }
            ValidationError::MissingCorrectionMarker => {
                write!(f, "Correction text must start with 'CORRECTION:'")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// HTTP methods an action may use.
pub const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Maximum allowed length for action names.
pub const MAX_ACTION_NAME_LENGTH: usize = 120;

/// Maximum allowed length for a single trigger keyword.
pub const MAX_KEYWORD_LENGTH: usize = 200;

/// Validate an action before it is stored.
///
/// Checks:
/// - Name is present and bounded
/// - Method is one of [`HTTP_METHODS`]
/// - URL is absolute http(s)
/// - Header and body templates parse as JSON
/// - Active actions carry at least one non-blank keyword
pub fn validate_action(action: &ActionRecord) -> Result<(), ValidationError> {
    let name = action.name.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty("action name".to_string()));
    }
    if name.chars().count() > MAX_ACTION_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "action name".to_string(),
            max: MAX_ACTION_NAME_LENGTH,
            actual: name.chars().count(),
        });
    }

    validate_http_method(&action.http_method)?;
    validate_action_url(&action.url)?;
    validate_template("headers template", action.headers_template.as_deref())?;
    validate_template("body template", action.body_template.as_deref())?;

    for keyword in action.trigger_keywords.iter() {
        let len = keyword.chars().count();
        if len > MAX_KEYWORD_LENGTH {
            return Err(ValidationError::TooLong {
                field: "trigger keyword".to_string(),
                max: MAX_KEYWORD_LENGTH,
                actual: len,
            });
        }
    }

    if action.is_active && !action.trigger_keywords.iter().any(|k| !k.trim().is_empty()) {
        return Err(ValidationError::NoTriggerKeywords(name.to_string()));
    }

    Ok(())
}

/// Validate an HTTP method name (case-sensitive, upper case).
pub fn validate_http_method(method: &str) -> Result<(), ValidationError> {
    if HTTP_METHODS.contains(&method) {
        Ok(())
    } else {
        Err(ValidationError::InvalidMethod(method.to_string()))
    }
}

/// Validate that an action URL is absolute http or https.
///
/// The URL may contain no placeholders; only headers and body are templated.
pub fn validate_action_url(url: &str) -> Result<(), ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::Empty("url".to_string()));
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ValidationError::InvalidUrl("must start with http:// or https://".to_string()))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }
    Ok(())
}

/// Validate that optional template text parses as JSON.
pub fn validate_template(field: &str, template: Option<&str>) -> Result<(), ValidationError> {
    let Some(text) = template else {
        return Ok(());
    };
    serde_json::from_str::<serde_json::Value>(text)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidTemplate {
            field: field.to_string(),
            message: e.to_string(),
        })
}
