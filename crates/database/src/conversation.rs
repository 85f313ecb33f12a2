//! Conversation turn persistence.

use sqlx::SqlitePool;

use crate::models::{ConversationTurn, NewTurn};
use crate::Result;

/// Append a turn to a session's history.
pub async fn append_turn(pool: &SqlitePool, turn: &NewTurn) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_messages (chatbot_id, session_id, role, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&turn.chatbot_id)
    .bind(&turn.session_id)
    .bind(&turn.role)
    .bind(&turn.content)
    .bind(&turn.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the most recent turns created strictly before `before`, oldest first.
///
/// `before` is an RFC 3339 UTC timestamp in the same format turns are stored
/// with, so text comparison orders correctly.
pub async fn recent_turns(
    pool: &SqlitePool,
    chatbot_id: &str,
    session_id: &str,
    before: &str,
    limit: i64,
) -> Result<Vec<ConversationTurn>> {
    let mut rows = sqlx::query_as::<_, ConversationTurn>(
        r#"
        SELECT id, chatbot_id, session_id, role, content, created_at
        FROM chat_messages
        WHERE chatbot_id = ? AND session_id = ? AND created_at < ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(chatbot_id)
    .bind(session_id)
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows)
}
