//! Chatbot (tenant) operations.

use sqlx::SqlitePool;

use crate::error::{map_unique_violation, DatabaseError, Result};
use crate::models::Chatbot;

/// Create a new chatbot.
pub async fn create_chatbot(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    system_prompt: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chatbots (id, name, system_prompt)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(system_prompt)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, "Chatbot", id))?;

    Ok(())
}

/// Get a chatbot by ID.
pub async fn get_chatbot(pool: &SqlitePool, id: &str) -> Result<Chatbot> {
    sqlx::query_as::<_, Chatbot>(
        r#"
        SELECT id, name, system_prompt, created_at
        FROM chatbots
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Chatbot",
        id: id.to_string(),
    })
}

/// Replace a chatbot's tenant instructions.
pub async fn update_system_prompt(
    pool: &SqlitePool,
    id: &str,
    system_prompt: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chatbots SET system_prompt = ? WHERE id = ?
        "#,
    )
    .bind(system_prompt)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Chatbot",
            id: id.to_string(),
        });
    }

    Ok(())
}
