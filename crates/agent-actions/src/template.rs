//! Placeholder substitution for action templates.
//!
//! Templates are JSON trees whose strings (keys included) may contain
//! `{{ ... }}` placeholders:
//!
//! - `{{vault:name}}` or `{{secret:name}}` - a secret from the tenant's vault
//! - `{{user_query}}`, `{{chatbot_id}}`, `{{timestamp}}`, `{{user_id}}` - request context
//! - `{{response.key}}` - a top-level field of an action's response body
//!
//! Substitution walks the parsed tree and rewrites each string in a single
//! left-to-right pass. Substituted text is never scanned again, so a value
//! that itself looks like a placeholder stays literal, and since values land
//! inside JSON strings the result is always valid JSON. Placeholders that
//! are not recognised are left untouched.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::TemplateError;
use crate::secrets::SecretMap;

/// Request values available to `{{key}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    pub user_query: String,
    pub chatbot_id: String,
    /// RFC 3339 timestamp of the request.
    pub timestamp: String,
    /// Authenticated caller, if any. Renders as empty when absent.
    pub user_id: Option<String>,
}

impl TemplateContext {
    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "user_query" => Some(&self.user_query),
            "chatbot_id" => Some(&self.chatbot_id),
            "timestamp" => Some(&self.timestamp),
            "user_id" => Some(self.user_id.as_deref().unwrap_or("")),
            _ => None,
        }
    }
}

/// A parsed action response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Parse as JSON when possible, otherwise keep the raw text.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text.to_string()),
        }
    }

    /// A top-level field of an object body, rendered for display.
    ///
    /// A missing field renders empty; a present `null` renders as `null`.
    fn field(&self, key: &str) -> String {
        let ResponseBody::Json(Value::Object(map)) = self else {
            return String::new();
        };
        match map.get(key) {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder<'a> {
    Secret(&'a str),
    Context(&'a str),
    Response(&'a str),
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_secret_name_char(c: char) -> bool {
    is_word_char(c) || c == '.' || c == '-'
}

/// Parse a placeholder at the start of `s`, which must begin with `{{`.
///
/// Returns the placeholder and the number of bytes it spans.
fn parse_placeholder(s: &str) -> Option<(Placeholder<'_>, usize)> {
    let inner_start = 2 + leading_whitespace(&s[2..]);
    let token_len = s[inner_start..]
        .find(|c: char| !(is_secret_name_char(c) || c == ':'))
        .unwrap_or(s.len() - inner_start);
    let token = &s[inner_start..inner_start + token_len];
    let close = inner_start + token_len + leading_whitespace(&s[inner_start + token_len..]);
    if token.is_empty() || !s[close..].starts_with("}}") {
        return None;
    }

    let placeholder = if let Some(name) = token
        .strip_prefix("vault:")
        .or_else(|| token.strip_prefix("secret:"))
    {
        if name.is_empty() || !name.chars().all(is_secret_name_char) {
            return None;
        }
        Placeholder::Secret(name)
    } else if let Some(key) = token.strip_prefix("response.") {
        if key.is_empty() || !key.chars().all(is_word_char) {
            return None;
        }
        Placeholder::Response(key)
    } else if token.chars().all(is_word_char) {
        Placeholder::Context(token)
    } else {
        return None;
    };

    Some((placeholder, close + 2))
}

fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// Rewrite every placeholder in `text` that `resolve` maps to a value.
fn substitute<F>(text: &str, mut resolve: F) -> Result<String, TemplateError>
where
    F: FnMut(Placeholder<'_>) -> Result<Option<String>, TemplateError>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match parse_placeholder(candidate) {
            Some((placeholder, len)) => {
                match resolve(placeholder)? {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&candidate[..len]),
                }
                rest = &candidate[len..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn visit_strings<'a>(value: &'a Value, f: &mut impl FnMut(&'a str)) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => {
            for item in items {
                visit_strings(item, &mut *f);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                f(key);
                visit_strings(item, &mut *f);
            }
        }
        _ => {}
    }
}

/// Collect the distinct secret names a template references.
pub fn secret_names(template: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    visit_strings(template, &mut |text: &str| {
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            let candidate = &rest[start..];
            match parse_placeholder(candidate) {
                Some((Placeholder::Secret(name), len)) => {
                    names.insert(name.to_string());
                    rest = &candidate[len..];
                }
                Some((_, len)) => rest = &candidate[len..],
                None => rest = &candidate[1..],
            }
        }
    });
    names
}

fn render_str(
    text: &str,
    context: &TemplateContext,
    secrets: &SecretMap,
) -> Result<String, TemplateError> {
    substitute(text, |placeholder| match placeholder {
        Placeholder::Secret(name) => secrets
            .get(name)
            .map(|value| Some(value.to_string()))
            .ok_or_else(|| TemplateError::UnresolvedSecret(name.to_string())),
        Placeholder::Context(key) => Ok(context.lookup(key).map(str::to_string)),
        Placeholder::Response(_) => Ok(None),
    })
}

/// Render a request template against the context and resolved secrets.
///
/// Fails with [`TemplateError::UnresolvedSecret`] if a secret placeholder
/// has no entry in `secrets`.
pub fn render(
    template: &Value,
    context: &TemplateContext,
    secrets: &SecretMap,
) -> Result<Value, TemplateError> {
    Ok(match template {
        Value::String(s) => Value::String(render_str(s, context, secrets)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| render(item, context, secrets))
                .collect::<Result<Vec<_>, TemplateError>>()?,
        ),
        Value::Object(map) => {
            let mut rendered = Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(render_str(key, context, secrets)?, render(item, context, secrets)?);
            }
            Value::Object(rendered)
        }
        other => other.clone(),
    })
}

/// Render rendered headers into name/value pairs.
///
/// String values are used as-is; other values use their JSON text.
pub fn header_pairs(headers: &Value) -> Result<Vec<(String, String)>, TemplateError> {
    let Value::Object(map) = headers else {
        return Err(TemplateError::HeadersNotObject);
    };
    Ok(map
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect())
}

/// Fill `{{response.key}}` placeholders from a response body.
///
/// Best effort: missing keys and non-object bodies render as empty text,
/// and every other placeholder is left as written.
pub fn render_response_message(template: &str, body: &ResponseBody) -> String {
    let rendered = substitute(template, |placeholder| {
        Ok(match placeholder {
            Placeholder::Response(key) => Some(body.field(key)),
            _ => None,
        })
    });
    rendered.unwrap_or_else(|_| template.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> TemplateContext {
        TemplateContext {
            user_query: "where is order 4411?".to_string(),
            chatbot_id: "bot-1".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            user_id: None,
        }
    }

    fn secrets(pairs: &[(&str, &str)]) -> SecretMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let template = json!({
            "a": [1, 2.5, true, null],
            "b": {"c": "plain {braces} and }} text"},
        });
        let rendered = render(&template, &context(), &SecretMap::default()).unwrap();
        assert_eq!(rendered, template);
    }

    #[test]
    fn test_context_and_secret_substitution() {
        let template = json!({
            "Authorization": "Bearer {{ vault:shop.api-key }}",
            "X-Bot": "{{chatbot_id}}",
            "query": "{{user_query}}",
            "user": "{{user_id}}",
        });
        let rendered = render(&template, &context(), &secrets(&[("shop.api-key", "sk-1")])).unwrap();
        assert_eq!(
            rendered,
            json!({
                "Authorization": "Bearer sk-1",
                "X-Bot": "bot-1",
                "query": "where is order 4411?",
                "user": "",
            })
        );
    }

    #[test]
    fn test_secret_alias() {
        let template = json!("{{secret:token}}");
        let rendered = render(&template, &context(), &secrets(&[("token", "t")])).unwrap();
        assert_eq!(rendered, json!("t"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let mut ctx = context();
        ctx.user_query = "{{vault:token}} \"quoted\" \\ {{chatbot_id}}".to_string();
        let template = json!({"q": "{{user_query}}", "k": "{{vault:token}}"});
        let rendered = render(&template, &ctx, &secrets(&[("token", "{{user_query}}")])).unwrap();
        assert_eq!(rendered["q"], json!("{{vault:token}} \"quoted\" \\ {{chatbot_id}}"));
        assert_eq!(rendered["k"], json!("{{user_query}}"));
    }

    #[test]
    fn test_missing_secret_fails() {
        let template = json!({"k": "{{vault:missing}}"});
        assert_eq!(
            render(&template, &context(), &SecretMap::default()),
            Err(TemplateError::UnresolvedSecret("missing".to_string()))
        );
    }

    #[test]
    fn test_unknown_and_malformed_placeholders_left_literal() {
        let template = json!("{{unknown}} {{ user query }} {{vault:}} {{response.id}} {{user_query");
        let rendered = render(&template, &context(), &SecretMap::default()).unwrap();
        assert_eq!(
            rendered,
            json!("{{unknown}} {{ user query }} {{vault:}} {{response.id}} {{user_query")
        );
    }

    #[test]
    fn test_nested_braces_still_resolve_inner_placeholder() {
        let template = json!("{{{{chatbot_id}}}}");
        let rendered = render(&template, &context(), &SecretMap::default()).unwrap();
        assert_eq!(rendered, json!("{{bot-1}}"));
    }

    #[test]
    fn test_secret_names_cover_keys_and_nested_values() {
        let template = json!({
            "{{vault:header_name}}": ["x", {"deep": "{{secret:b}} and {{vault:a}}"}],
            "dup": "{{vault:a}}",
            "ctx": "{{user_query}}",
        });
        let names: Vec<_> = secret_names(&template).into_iter().collect();
        assert_eq!(names, vec!["a", "b", "header_name"]);
    }

    #[test]
    fn test_header_pairs() {
        let pairs = header_pairs(&json!({"X-Count": 3, "Accept": "application/json"})).unwrap();
        assert!(pairs.contains(&("X-Count".to_string(), "3".to_string())));
        assert!(pairs.contains(&("Accept".to_string(), "application/json".to_string())));
        assert_eq!(header_pairs(&json!(["a"])), Err(TemplateError::HeadersNotObject));
    }

    #[test]
    fn test_response_message() {
        let body = ResponseBody::parse(r#"{"status": "shipped", "count": 2, "none": null}"#);
        let message = render_response_message(
            "Order is {{response.status}} ({{ response.count }} items){{response.missing}}.",
            &body,
        );
        assert_eq!(message, "Order is shipped (2 items).");

        let tracking = render_response_message("Tracking: {{response.none}}|{{response.gone}}|", &body);
        assert_eq!(tracking, "Tracking: null||");

        let text = ResponseBody::parse("plain text");
        assert_eq!(text, ResponseBody::Text("plain text".to_string()));
        assert_eq!(render_response_message("got {{response.status}}", &text), "got ");

        let array = ResponseBody::parse("[1, 2]");
        assert_eq!(render_response_message("{{response.0}}|{{user_query}}", &array), "|{{user_query}}");
    }
}
