//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A tenant chatbot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Chatbot {
    pub id: String,
    /// Display name
    pub name: String,
    /// Tenant-defined instructions, if any.
    pub system_prompt: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// A stored action row. Templates are kept as raw JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActionRecord {
    pub id: String,
    pub chatbot_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Ordered trigger keywords.
    pub trigger_keywords: Json<Vec<String>>,
    /// One of GET, POST, PUT, DELETE, PATCH.
    pub http_method: String,
    pub url: String,
    pub headers_template: Option<String>,
    pub body_template: Option<String>,
    pub success_message_template: Option<String>,
    pub is_active: bool,
    /// Stored order; lower positions are matched first.
    pub position: i64,
}

/// A persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConversationTurn {
    /// Auto-incrementing ID.
    pub id: i64,
    pub chatbot_id: String,
    pub session_id: String,
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    /// RFC 3339 UTC timestamp.
    pub created_at: String,
}

/// A conversation turn to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub chatbot_id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// A stored knowledge chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DocumentChunk {
    /// Auto-incrementing ID.
    pub id: i64,
    pub chatbot_id: String,
    /// Source document the chunk was cut from.
    pub document_id: String,
    pub content: String,
    pub embedding: Option<Json<Vec<f32>>>,
}

/// A knowledge chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: i64,
    pub content: String,
    /// Cosine similarity to the query embedding.
    pub score: f32,
}
