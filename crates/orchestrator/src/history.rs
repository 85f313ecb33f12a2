//! Conversation history window.

use std::sync::Arc;

use brain_core::{ChatMessage, Role};
use tracing::warn;

use crate::deadline::RequestDeadline;
use crate::store::ChatStore;

/// Fetch and inclusion caps for prior turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySettings {
    /// Turns read from the store.
    pub fetch_limit: usize,
    /// Turns placed in the prompt, taken from the end of the fetched window.
    pub include_limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            fetch_limit: 30,
            include_limit: 15,
        }
    }
}

/// Loads prior turns of a session as chat messages.
#[derive(Clone)]
pub struct HistoryWindow {
    store: Arc<dyn ChatStore>,
    settings: HistorySettings,
}

impl HistoryWindow {
    pub fn new(store: Arc<dyn ChatStore>, settings: HistorySettings) -> Self {
        Self { store, settings }
    }

    /// Turns created before `before`, oldest first, at most `include_limit`.
    ///
    /// Store failures and timeouts yield an empty history.
    pub async fn load(
        &self,
        chatbot_id: &str,
        session_id: &str,
        before: &str,
        deadline: &RequestDeadline,
    ) -> Vec<ChatMessage> {
        let fetch = self
            .store
            .recent_turns(chatbot_id, session_id, before, self.settings.fetch_limit);

        let turns = match deadline.run(fetch).await {
            Ok(Ok(turns)) => turns,
            Ok(Err(e)) => {
                warn!("History unavailable for session {}: {}", session_id, e);
                return Vec::new();
            }
            Err(_) => {
                warn!("History unavailable for session {}: timed out", session_id);
                return Vec::new();
            }
        };

        let skip = turns.len().saturating_sub(self.settings.include_limit);
        turns
            .into_iter()
            .skip(skip)
            .filter_map(|turn| match Role::parse(&turn.role) {
                Some(role) if role != Role::System => Some(ChatMessage {
                    role,
                    content: turn.content,
                }),
                _ => {
                    warn!("Skipping turn {} with role '{}'", turn.id, turn.role);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use agent_actions::Action;
    use async_trait::async_trait;
    use database::{Chatbot, ConversationTurn, NewTurn};
    use std::time::Duration;

    /// Holds turns in memory and applies the same window as the SQL query.
    struct MemoryTurns {
        turns: Vec<ConversationTurn>,
        fail: bool,
    }

    impl MemoryTurns {
        fn with_turns(count: usize) -> Self {
            let turns = (0..count)
                .map(|i| ConversationTurn {
                    id: i as i64,
                    chatbot_id: "bot".to_string(),
                    session_id: "s1".to_string(),
                    role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                    content: format!("turn {i}"),
                    created_at: format!("2025-01-01T00:00:{i:02}.000000Z"),
                })
                .collect();
            Self { turns, fail: false }
        }
    }

    #[async_trait]
    impl ChatStore for MemoryTurns {
        async fn find_chatbot(&self, _chatbot_id: &str) -> Result<Option<Chatbot>, StoreError> {
            Ok(None)
        }

        async fn list_actions(&self, _chatbot_id: &str) -> Result<Vec<Action>, StoreError> {
            Ok(Vec::new())
        }

        async fn recent_turns(
            &self,
            chatbot_id: &str,
            session_id: &str,
            before: &str,
            limit: usize,
        ) -> Result<Vec<ConversationTurn>, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("store offline".to_string()));
            }
            let matching: Vec<_> = self
                .turns
                .iter()
                .filter(|t| {
                    t.chatbot_id == chatbot_id
                        && t.session_id == session_id
                        && t.created_at.as_str() < before
                })
                .cloned()
                .collect();
            let skip = matching.len().saturating_sub(limit);
            Ok(matching.into_iter().skip(skip).collect())
        }

        async fn append_turn(&self, _turn: &NewTurn) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn deadline() -> RequestDeadline {
        RequestDeadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_forty_turns_keeps_last_fifteen() {
        let window = HistoryWindow::new(Arc::new(MemoryTurns::with_turns(40)), HistorySettings::default());
        let history = window
            .load("bot", "s1", "2025-01-01T00:01:00.000000Z", &deadline())
            .await;

        assert_eq!(history.len(), 15);
        assert_eq!(history[0].content, "turn 25");
        assert_eq!(history[14].content, "turn 39");
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_turns_at_or_after_cutoff_excluded() {
        let window = HistoryWindow::new(Arc::new(MemoryTurns::with_turns(4)), HistorySettings::default());
        let history = window
            .load("bot", "s1", "2025-01-01T00:00:03.000000Z", &deadline())
            .await;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 0", "turn 1", "turn 2"]);
    }

    #[tokio::test]
    async fn test_store_failure_gives_empty_history() {
        let store = MemoryTurns {
            fail: true,
            ..MemoryTurns::with_turns(3)
        };
        let window = HistoryWindow::new(Arc::new(store), HistorySettings::default());
        assert!(window.load("bot", "s1", "9999", &deadline()).await.is_empty());
    }

    #[tokio::test]
    async fn test_other_session_not_included() {
        let window = HistoryWindow::new(Arc::new(MemoryTurns::with_turns(4)), HistorySettings::default());
        assert!(window.load("bot", "s2", "9999", &deadline()).await.is_empty());
    }
}
