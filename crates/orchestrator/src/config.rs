//! Orchestrator settings loaded from the environment.

use std::env;
use std::time::Duration;

use brain_core::SamplingParams;

use crate::history::HistorySettings;
use crate::retrieval::RetrievalSettings;

/// Default overall budget for one chat request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap for a single outbound action call.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum query length in characters.
pub const DEFAULT_MAX_QUERY_CHARS: usize = 4000;

/// Settings for [`crate::Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sampling parameters for every completion call.
    pub sampling: SamplingParams,
    pub retrieval: RetrievalSettings,
    pub history: HistorySettings,
    /// Budget for the whole request; every downstream call shares it.
    pub request_timeout: Duration,
    /// Upper bound for an outbound action call within the request budget.
    pub action_timeout: Duration,
    /// Longest accepted query.
    pub max_query_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingParams::default(),
            retrieval: RetrievalSettings::default(),
            history: HistorySettings::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
        }
    }
}

impl OrchestratorConfig {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// - `CHAT_TEMPERATURE`, `CHAT_MAX_TOKENS`
    /// - `RAG_SIMILARITY_THRESHOLD`, `RAG_MATCH_COUNT`
    /// - `RAG_CORRECTION_THRESHOLD`, `RAG_CORRECTION_COUNT`
    /// - `HISTORY_FETCH_LIMIT`, `HISTORY_INCLUDE_LIMIT`
    /// - `CHAT_REQUEST_TIMEOUT_SECS`, `ACTION_TIMEOUT_SECS`
    /// - `CHAT_MAX_QUERY_CHARS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_parse("CHAT_TEMPERATURE") {
            config.sampling.temperature = value;
        }
        if let Some(value) = env_parse("CHAT_MAX_TOKENS") {
            config.sampling.max_tokens = value;
        }
        if let Some(value) = env_parse("RAG_SIMILARITY_THRESHOLD") {
            config.retrieval.semantic_threshold = value;
        }
        if let Some(value) = env_parse("RAG_MATCH_COUNT") {
            config.retrieval.semantic_limit = value;
        }
        if let Some(value) = env_parse("RAG_CORRECTION_THRESHOLD") {
            config.retrieval.correction_threshold = value;
        }
        if let Some(value) = env_parse("RAG_CORRECTION_COUNT") {
            config.retrieval.correction_limit = value;
        }
        if let Some(value) = env_parse("HISTORY_FETCH_LIMIT") {
            config.history.fetch_limit = value;
        }
        if let Some(value) = env_parse("HISTORY_INCLUDE_LIMIT") {
            config.history.include_limit = value;
        }
        if let Some(secs) = env_parse::<u64>("CHAT_REQUEST_TIMEOUT_SECS").filter(|s| *s > 0) {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("ACTION_TIMEOUT_SECS").filter(|s| *s > 0) {
            config.action_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = env_parse("CHAT_MAX_QUERY_CHARS") {
            config.max_query_chars = value;
        }

        config
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.sampling.temperature, 0.3);
        assert_eq!(config.sampling.max_tokens, 500);
        assert_eq!(config.retrieval.semantic_threshold, 0.65);
        assert_eq!(config.retrieval.semantic_limit, 8);
        assert_eq!(config.retrieval.correction_threshold, 0.55);
        assert_eq!(config.retrieval.correction_limit, 3);
        assert_eq!(config.history.fetch_limit, 30);
        assert_eq!(config.history.include_limit, 15);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.action_timeout, Duration::from_secs(10));
    }

    // Environment-based tests are combined into a single test to avoid
    // race conditions when tests run in parallel (env vars are process-global).
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        let vars = [
            "CHAT_TEMPERATURE",
            "CHAT_MAX_TOKENS",
            "RAG_MATCH_COUNT",
            "HISTORY_INCLUDE_LIMIT",
            "CHAT_REQUEST_TIMEOUT_SECS",
            "ACTION_TIMEOUT_SECS",
        ];
        for var in vars {
            std::env::remove_var(var);
        }

        std::env::set_var("CHAT_TEMPERATURE", "0.1");
        std::env::set_var("CHAT_MAX_TOKENS", "256");
        std::env::set_var("RAG_MATCH_COUNT", "5");
        std::env::set_var("HISTORY_INCLUDE_LIMIT", "not-a-number");
        std::env::set_var("CHAT_REQUEST_TIMEOUT_SECS", "0");
        std::env::set_var("ACTION_TIMEOUT_SECS", " 4 ");

        let config = OrchestratorConfig::from_env();
        assert_eq!(config.sampling.temperature, 0.1);
        assert_eq!(config.sampling.max_tokens, 256);
        assert_eq!(config.retrieval.semantic_limit, 5);
        assert_eq!(config.history.include_limit, 15);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.action_timeout, Duration::from_secs(4));

        for var in vars {
            std::env::remove_var(var);
        }
    }
}
