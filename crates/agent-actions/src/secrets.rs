//! Fail-closed secret resolution.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ActionError;

/// A tenant's secret store.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Look up secrets by name for one chatbot.
    ///
    /// Absent names may be omitted or mapped to `None`.
    async fn fetch_secrets(
        &self,
        chatbot_id: &str,
        names: &[String],
    ) -> Result<HashMap<String, Option<String>>, ActionError>;
}

/// Resolved secret values. `Debug` prints names only.
#[derive(Clone, Default)]
pub struct SecretMap(HashMap<String, String>);

impl SecretMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.0.keys().collect();
        names.sort();
        f.debug_struct("SecretMap").field("names", &names).finish()
    }
}

impl FromIterator<(String, String)> for SecretMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolve every name through one vault read.
///
/// Fails with [`ActionError::SecretNotFound`] naming the first (in sorted
/// order) name the vault has no value for. An empty name set never touches
/// the vault.
pub async fn resolve_secrets(
    vault: &dyn SecretVault,
    chatbot_id: &str,
    names: &BTreeSet<String>,
) -> Result<SecretMap, ActionError> {
    if names.is_empty() {
        return Ok(SecretMap::default());
    }

    let requested: Vec<String> = names.iter().cloned().collect();
    let mut fetched = vault.fetch_secrets(chatbot_id, &requested).await?;

    let mut resolved = HashMap::with_capacity(requested.len());
    for name in requested {
        match fetched.remove(&name).flatten() {
            Some(value) => {
                resolved.insert(name, value);
            }
            None => return Err(ActionError::SecretNotFound(name)),
        }
    }

    debug!("Resolved {} secret(s) for chatbot {}", resolved.len(), chatbot_id);
    Ok(SecretMap(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticVault {
        values: HashMap<String, Option<String>>,
        calls: AtomicUsize,
    }

    impl StaticVault {
        fn new(pairs: &[(&str, Option<&str>)]) -> Self {
            Self {
                values: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SecretVault for StaticVault {
        async fn fetch_secrets(
            &self,
            _chatbot_id: &str,
            names: &[String],
        ) -> Result<HashMap<String, Option<String>>, ActionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(names
                .iter()
                .filter_map(|n| self.values.get(n).map(|v| (n.clone(), v.clone())))
                .collect())
        }
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolves_all_names_in_one_read() {
        let vault = StaticVault::new(&[("a", Some("1")), ("b", Some("2"))]);
        let secrets = resolve_secrets(&vault, "bot", &names(&["a", "b"])).await.unwrap();
        assert_eq!(secrets.get("a"), Some("1"));
        assert_eq!(secrets.get("b"), Some("2"));
        assert_eq!(vault.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_null_or_absent_fails_closed() {
        let vault = StaticVault::new(&[("a", Some("1")), ("b", None)]);
        let err = resolve_secrets(&vault, "bot", &names(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::SecretNotFound(name) if name == "b"));
    }

    #[tokio::test]
    async fn test_empty_names_skip_vault() {
        let vault = StaticVault::new(&[]);
        let secrets = resolve_secrets(&vault, "bot", &BTreeSet::new()).await.unwrap();
        assert!(secrets.is_empty());
        assert_eq!(vault.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets: SecretMap = [("token".to_string(), "sk-live-123".to_string())]
            .into_iter()
            .collect();
        let printed = format!("{:?}", secrets);
        assert!(printed.contains("token"));
        assert!(!printed.contains("sk-live-123"));
    }
}
