//! Action persistence.

use sqlx::SqlitePool;

use crate::error::{map_unique_violation, Result};
use crate::models::ActionRecord;
use crate::validation::validate_action;

/// Validate and insert a new action.
pub async fn create_action(pool: &SqlitePool, action: &ActionRecord) -> Result<()> {
    validate_action(action)?;

    sqlx::query(
        r#"
        INSERT INTO chatbot_actions (
            id, chatbot_id, name, description, trigger_keywords, http_method, url,
            headers_template, body_template, success_message_template, is_active, position
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&action.id)
    .bind(&action.chatbot_id)
    .bind(&action.name)
    .bind(&action.description)
    .bind(&action.trigger_keywords)
    .bind(&action.http_method)
    .bind(&action.url)
    .bind(&action.headers_template)
    .bind(&action.body_template)
    .bind(&action.success_message_template)
    .bind(action.is_active)
    .bind(action.position)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, "Action", &action.id))?;

    Ok(())
}

/// List a chatbot's active actions in stored order.
pub async fn list_active_actions(pool: &SqlitePool, chatbot_id: &str) -> Result<Vec<ActionRecord>> {
    let rows = sqlx::query_as::<_, ActionRecord>(
        r#"
        SELECT id, chatbot_id, name, description, trigger_keywords, http_method, url,
               headers_template, body_template, success_message_template, is_active, position
        FROM chatbot_actions
        WHERE chatbot_id = ? AND is_active = 1
        ORDER BY position ASC, created_at ASC, id ASC
        "#,
    )
    .bind(chatbot_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Enable or disable an action.
pub async fn set_action_active(pool: &SqlitePool, id: &str, is_active: bool) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE chatbot_actions SET is_active = ? WHERE id = ?
        "#,
    )
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
