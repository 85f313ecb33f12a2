//! Knowledge chunk storage and search.
//!
//! Chunks are produced by an ingestion pipeline outside this crate. Two
//! searches are offered: a case-insensitive substring search over chunk
//! text, and a brute-force cosine similarity search over stored embeddings.
//!
//! Corrections are ordinary chunks whose text starts with
//! [`CORRECTION_MARKER`]; [`insert_correction`] is the only writer that
//! enforces the marker.

use std::cmp::Ordering;

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::models::{DocumentChunk, ScoredChunk};
use crate::validation::ValidationError;
use crate::Result;

/// Prefix that marks a chunk as an authoritative correction.
pub const CORRECTION_MARKER: &str = "CORRECTION:";

/// Document ID shared by all correction chunks of a chatbot.
pub const CORRECTIONS_DOCUMENT_ID: &str = "corrections";

/// Insert a chunk, returning its ID.
pub async fn insert_chunk(
    pool: &SqlitePool,
    chatbot_id: &str,
    document_id: &str,
    content: &str,
    embedding: Option<&[f32]>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO document_chunks (chatbot_id, document_id, content, content_lower, embedding)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(chatbot_id)
    .bind(document_id)
    .bind(content)
    .bind(content.to_lowercase())
    .bind(embedding.map(Json))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Store a correction chunk, returning its ID.
///
/// The content must start with [`CORRECTION_MARKER`] and carry an embedding,
/// otherwise the correction tier could never retrieve it.
pub async fn insert_correction(
    pool: &SqlitePool,
    chatbot_id: &str,
    content: &str,
    embedding: &[f32],
) -> Result<i64> {
    if !content.trim_start().starts_with(CORRECTION_MARKER) {
        return Err(ValidationError::MissingCorrectionMarker.into());
    }
    if embedding.is_empty() {
        return Err(ValidationError::Empty("correction embedding".to_string()).into());
    }

    let id = insert_chunk(
        pool,
        chatbot_id,
        CORRECTIONS_DOCUMENT_ID,
        content.trim(),
        Some(embedding),
    )
    .await?;
    tracing::info!("Stored correction chunk {} for chatbot {}", id, chatbot_id);
    Ok(id)
}

/// Find chunk texts containing `pattern`, case-insensitively, in insertion order.
///
/// Case folding is Unicode-aware, so `häuser` matches `HÄUSER`.
pub async fn search_chunks_by_text(
    pool: &SqlitePool,
    chatbot_id: &str,
    pattern: &str,
    limit: i64,
) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT content
        FROM document_chunks
        WHERE chatbot_id = ? AND instr(content_lower, ?) > 0
        ORDER BY id ASC
        LIMIT ?
        "#,
    )
    .bind(chatbot_id)
    .bind(pattern.to_lowercase())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(content,)| content).collect())
}

/// Rank a chatbot's embedded chunks by cosine similarity to `query`.
///
/// Returns at most `limit` chunks scoring at least `threshold`, best first.
/// Equal scores keep insertion order. Chunks whose embedding dimension
/// differs from the query are skipped.
pub async fn match_chunks(
    pool: &SqlitePool,
    chatbot_id: &str,
    query: &[f32],
    threshold: f32,
    limit: usize,
) -> Result<Vec<ScoredChunk>> {
    let rows = sqlx::query_as::<_, DocumentChunk>(
        r#"
        SELECT id, chatbot_id, document_id, content, embedding
        FROM document_chunks
        WHERE chatbot_id = ? AND embedding IS NOT NULL
        ORDER BY id ASC
        "#,
    )
    .bind(chatbot_id)
    .fetch_all(pool)
    .await?;

    let mut scored: Vec<ScoredChunk> = rows
        .into_iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding?;
            let score = cosine_similarity(query, &embedding)?;
            (score >= threshold).then_some(ScoredChunk {
                id: chunk.id,
                content: chunk.content,
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    scored.truncate(limit);

    tracing::debug!(
        "match_chunks: chatbot={} threshold={} matched={}",
        chatbot_id,
        threshold,
        scored.len()
    );

    Ok(scored)
}

/// Cosine similarity of two vectors, or `None` if undefined.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
