//! Storage seams used by the orchestrator, and their SQLite implementation.

use std::collections::HashMap;

use agent_actions::{Action, ActionError, HttpMethod, JsonTemplate, SecretVault};
use async_trait::async_trait;
use database::{
    action, chatbot, conversation, knowledge, vault, ActionRecord, Chatbot, ConversationTurn,
    Database, DatabaseError, NewTurn, ScoredChunk,
};
use tracing::warn;

use crate::error::StoreError;

/// Relational reads and writes for tenants, actions, and conversation turns.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Look up a chatbot, `None` if it does not exist.
    async fn find_chatbot(&self, chatbot_id: &str) -> Result<Option<Chatbot>, StoreError>;

    /// Active actions in stored order.
    async fn list_actions(&self, chatbot_id: &str) -> Result<Vec<Action>, StoreError>;

    /// Up to `limit` most recent turns created before `before`, oldest first.
    async fn recent_turns(
        &self,
        chatbot_id: &str,
        session_id: &str,
        before: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError>;

    async fn append_turn(&self, turn: &NewTurn) -> Result<(), StoreError>;
}

/// Vector similarity search over a tenant's knowledge chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Chunks scoring at least `threshold`, best first, at most `limit`.
    async fn query(
        &self,
        chatbot_id: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
}

/// Case-insensitive substring search over raw chunk text.
#[async_trait]
pub trait TextSearch: Send + Sync {
    async fn search_text(
        &self,
        chatbot_id: &str,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;
}

/// Writes of operator-authored knowledge.
#[async_trait]
pub trait KnowledgeWriter: Send + Sync {
    /// Store an embedded correction chunk, returning its ID.
    async fn add_correction(
        &self,
        chatbot_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StoreError>;
}

/// All storage seams backed by one SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Convert a stored row, skipping rows that can no longer run.
fn action_from_record(record: ActionRecord) -> Option<Action> {
    let method: HttpMethod = match record.http_method.parse() {
        Ok(method) => method,
        Err(e) => {
            warn!("Skipping action '{}': {}", record.name, e);
            return None;
        }
    };

    Some(Action {
        id: record.id,
        chatbot_id: record.chatbot_id,
        name: record.name,
        description: record.description,
        trigger_keywords: record.trigger_keywords.0,
        method,
        url: record.url,
        headers_template: record.headers_template.map(JsonTemplate::new),
        body_template: record.body_template.map(JsonTemplate::new),
        success_message_template: record.success_message_template,
        is_active: record.is_active,
    })
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn find_chatbot(&self, chatbot_id: &str) -> Result<Option<Chatbot>, StoreError> {
        match chatbot::get_chatbot(self.db.pool(), chatbot_id).await {
            Ok(bot) => Ok(Some(bot)),
            Err(DatabaseError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_actions(&self, chatbot_id: &str) -> Result<Vec<Action>, StoreError> {
        let records = action::list_active_actions(self.db.pool(), chatbot_id).await?;
        Ok(records.into_iter().filter_map(action_from_record).collect())
    }

    async fn recent_turns(
        &self,
        chatbot_id: &str,
        session_id: &str,
        before: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        Ok(conversation::recent_turns(self.db.pool(), chatbot_id, session_id, before, to_limit(limit)).await?)
    }

    async fn append_turn(&self, turn: &NewTurn) -> Result<(), StoreError> {
        Ok(conversation::append_turn(self.db.pool(), turn).await?)
    }
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn query(
        &self,
        chatbot_id: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        Ok(knowledge::match_chunks(self.db.pool(), chatbot_id, embedding, threshold, limit).await?)
    }
}

#[async_trait]
impl TextSearch for SqliteStore {
    async fn search_text(
        &self,
        chatbot_id: &str,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        Ok(knowledge::search_chunks_by_text(self.db.pool(), chatbot_id, pattern, to_limit(limit)).await?)
    }
}

#[async_trait]
impl KnowledgeWriter for SqliteStore {
    async fn add_correction(
        &self,
        chatbot_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StoreError> {
        Ok(knowledge::insert_correction(self.db.pool(), chatbot_id, content, embedding).await?)
    }
}

#[async_trait]
impl SecretVault for SqliteStore {
    async fn fetch_secrets(
        &self,
        chatbot_id: &str,
        names: &[String],
    ) -> Result<HashMap<String, Option<String>>, ActionError> {
        vault::get_secrets(self.db.pool(), chatbot_id, names)
            .await
            .map_err(|e| ActionError::Vault(e.to_string()))
    }
}
