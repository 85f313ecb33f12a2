//! Per-chatbot secret vault.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::Result;

/// Store or replace a secret.
pub async fn put_secret(pool: &SqlitePool, chatbot_id: &str, name: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vault_secrets (chatbot_id, name, value)
        VALUES (?, ?, ?)
        ON CONFLICT(chatbot_id, name) DO UPDATE SET
            value = excluded.value,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        "#,
    )
    .bind(chatbot_id)
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up secrets by name.
///
/// Every requested name appears in the result; absent secrets map to `None`.
pub async fn get_secrets(
    pool: &SqlitePool,
    chatbot_id: &str,
    names: &[String],
) -> Result<HashMap<String, Option<String>>> {
    let mut secrets = HashMap::with_capacity(names.len());
    for name in names {
        let value: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT value FROM vault_secrets WHERE chatbot_id = ? AND name = ?
            "#,
        )
        .bind(chatbot_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;
        secrets.insert(name.clone(), value.map(|(value,)| value));
    }
    Ok(secrets)
}
