//! SQLite persistence layer for the chat orchestrator.
//!
//! This crate provides async database operations for chatbots (tenants),
//! their actions and vault secrets, conversation turns, and knowledge chunks
//! using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{chatbot, conversation, Database, NewTurn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:chat.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     chatbot::create_chatbot(db.pool(), "support-bot", "Support", None).await?;
//!     conversation::append_turn(
//!         db.pool(),
//!         &NewTurn {
//!             chatbot_id: "support-bot".to_string(),
//!             session_id: "session-1".to_string(),
//!             role: "user".to_string(),
//!             content: "Hello".to_string(),
//!             created_at: "2025-01-01T00:00:00.000000Z".to_string(),
//!         },
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod chatbot;
pub mod conversation;
pub mod error;
pub mod knowledge;
pub mod models;
pub mod validation;
pub mod vault;

pub use error::{DatabaseError, Result};
pub use models::{ActionRecord, Chatbot, ConversationTurn, DocumentChunk, NewTurn, ScoredChunk};
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    pub const DEFAULT_POOL_SIZE: u32 = 5;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/chat.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// In-memory databases are private to a connection, so they are always
    /// opened with a single connection.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_size = if url.contains(":memory:") { 1 } else { pool_size };

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        chatbot::create_chatbot(db.pool(), "bot", "Support", Some("Be brief."))
            .await
            .unwrap();
        db
    }

    fn action(id: &str, position: i64, keyword: &str) -> ActionRecord {
        ActionRecord {
            id: id.to_string(),
            chatbot_id: "bot".to_string(),
            name: format!("Action {}", id),
            description: None,
            trigger_keywords: Json(vec![keyword.to_string()]),
            http_method: "GET".to_string(),
            url: "https://api.example.com/hook".to_string(),
            headers_template: None,
            body_template: None,
            success_message_template: None,
            is_active: true,
            position,
        }
    }

    fn turn(session: &str, role: &str, content: &str, created_at: String) -> NewTurn {
        NewTurn {
            chatbot_id: "bot".to_string(),
            session_id: session.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_chatbot_crud() {
        let db = test_db().await;

        let fetched = chatbot::get_chatbot(db.pool(), "bot").await.unwrap();
        assert_eq!(fetched.system_prompt.as_deref(), Some("Be brief."));

        chatbot::update_system_prompt(db.pool(), "bot", None).await.unwrap();
        let fetched = chatbot::get_chatbot(db.pool(), "bot").await.unwrap();
        assert_eq!(fetched.system_prompt, None);

        let duplicate = chatbot::create_chatbot(db.pool(), "bot", "Again", None).await;
        assert!(matches!(duplicate, Err(DatabaseError::AlreadyExists { .. })));

        let missing = chatbot::get_chatbot(db.pool(), "nope").await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_actions_listed_in_stored_order() {
        let db = test_db().await;

        action::create_action(db.pool(), &action("second", 2, "b")).await.unwrap();
        action::create_action(db.pool(), &action("first", 1, "a")).await.unwrap();
        action::create_action(db.pool(), &action("third", 3, "c")).await.unwrap();
        assert!(action::set_action_active(db.pool(), "third", false).await.unwrap());

        let actions = action::list_active_actions(db.pool(), "bot").await.unwrap();
        let ids: Vec<_> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(actions[0].trigger_keywords.0, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_action_rejected() {
        let db = test_db().await;
        let mut record = action("bad", 0, "x");
        record.http_method = "TRACE".to_string();

        let result = action::create_action(db.pool(), &record).await;
        assert!(matches!(result, Err(DatabaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_recent_turns_window() {
        let db = test_db().await;

        for i in 0..10 {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            let created_at = format!("2025-01-01T00:00:{:02}.000000Z", i);
            conversation::append_turn(db.pool(), &turn("s1", role, &format!("m{}", i), created_at))
                .await
                .unwrap();
        }
        conversation::append_turn(
            db.pool(),
            &turn("s2", "user", "other session", "2025-01-01T00:00:05.000000Z".to_string()),
        )
        .await
        .unwrap();

        let turns = conversation::recent_turns(db.pool(), "bot", "s1", "2025-01-01T00:00:09.000000Z", 4)
            .await
            .unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m5", "m6", "m7", "m8"]);
    }

    #[tokio::test]
    async fn test_text_search_is_case_insensitive() {
        let db = test_db().await;
        knowledge::insert_chunk(db.pool(), "bot", "doc", "Returns within 30 days", None)
            .await
            .unwrap();
        knowledge::insert_chunk(db.pool(), "bot", "doc", "Shipping to 90210 is free", None)
            .await
            .unwrap();

        let hits = knowledge::search_chunks_by_text(db.pool(), "bot", "RETURNS", 5)
            .await
            .unwrap();
        assert_eq!(hits, vec!["Returns within 30 days".to_string()]);

        let hits = knowledge::search_chunks_by_text(db.pool(), "other", "returns", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_text_search_folds_non_ascii_case() {
        let db = test_db().await;
        knowledge::insert_chunk(db.pool(), "bot", "doc", "PREISE FÜR HÄUSER IN BERLIN", None)
            .await
            .unwrap();

        let hits = knowledge::search_chunks_by_text(db.pool(), "bot", "häuser", 5)
            .await
            .unwrap();
        assert_eq!(hits, vec!["PREISE FÜR HÄUSER IN BERLIN".to_string()]);

        let hits = knowledge::search_chunks_by_text(db.pool(), "bot", "PREISE für", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_correction_requires_marker_and_embedding() {
        let db = test_db().await;

        let unmarked =
            knowledge::insert_correction(db.pool(), "bot", "Opening hours are 9-5", &[1.0, 0.0])
                .await;
        assert!(matches!(
            unmarked,
            Err(DatabaseError::Validation(ValidationError::MissingCorrectionMarker))
        ));

        let unembedded =
            knowledge::insert_correction(db.pool(), "bot", "CORRECTION: hours", &[]).await;
        assert!(matches!(unembedded, Err(DatabaseError::Validation(_))));

        let id = knowledge::insert_correction(
            db.pool(),
            "bot",
            "  CORRECTION: hours\n\nCorrect Answer: 9-5  ",
            &[1.0, 0.0],
        )
        .await
        .unwrap();
        assert!(id > 0);

        let matches = knowledge::match_chunks(db.pool(), "bot", &[1.0, 0.0], 0.5, 8)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].content, "CORRECTION: hours\n\nCorrect Answer: 9-5");
    }

    #[tokio::test]
    async fn test_match_chunks_threshold_and_order() {
        let db = test_db().await;
        knowledge::insert_chunk(db.pool(), "bot", "doc", "close", Some(&[1.0, 0.1][..]))
            .await
            .unwrap();
        knowledge::insert_chunk(db.pool(), "bot", "doc", "exact", Some(&[1.0, 0.0][..]))
            .await
            .unwrap();
        knowledge::insert_chunk(db.pool(), "bot", "doc", "orthogonal", Some(&[0.0, 1.0][..]))
            .await
            .unwrap();
        knowledge::insert_chunk(db.pool(), "bot", "doc", "no embedding", None)
            .await
            .unwrap();

        let matches = knowledge::match_chunks(db.pool(), "bot", &[1.0, 0.0], 0.65, 8)
            .await
            .unwrap();
        let contents: Vec<_> = matches.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["exact", "close"]);

        let top = knowledge::match_chunks(db.pool(), "bot", &[1.0, 0.0], 0.0, 1)
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].content, "exact");
    }

    #[tokio::test]
    async fn test_vault_reports_missing_names() {
        let db = test_db().await;
        vault::put_secret(db.pool(), "bot", "api_key", "old").await.unwrap();
        vault::put_secret(db.pool(), "bot", "api_key", "sk-123").await.unwrap();

        let names = vec!["api_key".to_string(), "missing".to_string()];
        let secrets = vault::get_secrets(db.pool(), "bot", &names).await.unwrap();
        assert_eq!(secrets.get("api_key"), Some(&Some("sk-123".to_string())));
        assert_eq!(secrets.get("missing"), Some(&None));
    }
}
