//! Tiered knowledge retrieval.
//!
//! Tiers, in order:
//!
//! 1. Semantic: vector search at the main threshold.
//! 2. Correction: a looser vector search whose hits must carry the correction
//!    marker. Runs alongside tier 1 and always ranks first in the output.
//! 3. Keyword: substring search per significant query token, only when tier 1
//!    found nothing.
//! 4. Numeric: when the query holds a 4+ digit number, results must mention
//!    one; if none do, a direct search for the numbers replaces them.
//!
//! A failing tier is logged and contributes nothing.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::deadline::RequestDeadline;
use crate::store::{TextSearch, VectorIndex};

pub use database::knowledge::CORRECTION_MARKER;

/// Context text used when retrieval finds nothing.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found in documents.";

/// Minimum length of a numeric token.
const MIN_NUMERIC_LEN: usize = 4;

/// Words must be longer than this to count as keywords.
const MIN_WORD_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "welcher", "ist", "für", "und", "oder", "eine", "einen", "die", "der", "das",
    // English filler, so English questions keep their keyword budget.
    "what", "which", "with", "that", "this", "your", "from", "have",
];

/// Thresholds and limits for each tier.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub semantic_threshold: f32,
    /// Result cap for the semantic tier, and for keyword and numeric search.
    pub semantic_limit: usize,
    pub correction_threshold: f32,
    pub correction_limit: usize,
    pub correction_marker: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.65,
            semantic_limit: 8,
            correction_threshold: 0.55,
            correction_limit: 3,
            correction_marker: CORRECTION_MARKER.to_string(),
        }
    }
}

/// Which tier produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkOrigin {
    Semantic,
    Correction,
    Keyword,
    Numeric,
}

/// A chunk selected for the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    /// Similarity score for vector tiers.
    pub score: Option<f32>,
    pub origin: ChunkOrigin,
}

/// Ordered, de-duplicated retrieval output. Corrections come first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    chunks: Vec<RetrievedChunk>,
    attempted: Vec<ChunkOrigin>,
}

impl RetrievalResult {
    pub fn chunks(&self) -> &[RetrievedChunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Tiers that issued at least one search, in order.
    pub fn attempted(&self) -> &[ChunkOrigin] {
        &self.attempted
    }

    /// Chunk texts for the prompt, or the sentinel alone when empty.
    pub fn context_texts(&self) -> Vec<&str> {
        if self.chunks.is_empty() {
            vec![NO_CONTEXT_SENTINEL]
        } else {
            self.chunks.iter().map(|c| c.content.as_str()).collect()
        }
    }
}

/// Significant tokens pulled from a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTokens {
    /// Digit runs of length 4 or more.
    pub numeric: Vec<String>,
    /// Numeric tokens followed by keywords, without repeats.
    pub all: Vec<String>,
}

/// Extract numeric and keyword tokens from a query.
pub fn extract_search_tokens(query: &str) -> SearchTokens {
    let numeric: IndexSet<String> = query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= MIN_NUMERIC_LEN && t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect();

    let lowered = query.to_lowercase();
    let words = lowered
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "äöüß".contains(c)))
        .filter(|w| w.chars().count() > MIN_WORD_CHARS && !STOP_WORDS.contains(w))
        .map(str::to_string);

    let mut all = numeric.clone();
    all.extend(words);

    SearchTokens {
        numeric: numeric.into_iter().collect(),
        all: all.into_iter().collect(),
    }
}

/// Runs the retrieval tiers against a vector index and a text search.
#[derive(Clone)]
pub struct RetrievalEngine {
    vectors: Arc<dyn VectorIndex>,
    text: Arc<dyn TextSearch>,
    settings: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(
        vectors: Arc<dyn VectorIndex>,
        text: Arc<dyn TextSearch>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            vectors,
            text,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Retrieve context for `query`.
    ///
    /// Without an embedding both vector tiers are skipped and the keyword
    /// tier runs as if the semantic tier found nothing.
    pub async fn retrieve(
        &self,
        chatbot_id: &str,
        query: &str,
        embedding: Option<&[f32]>,
        deadline: &RequestDeadline,
    ) -> RetrievalResult {
        let tokens = extract_search_tokens(query);
        let mut attempted = Vec::new();

        let (mut regular, corrections) = match embedding {
            Some(embedding) => {
                attempted.extend([ChunkOrigin::Semantic, ChunkOrigin::Correction]);
                let (semantic, corrections) = tokio::join!(
                    self.vector_tier(
                        chatbot_id,
                        embedding,
                        ChunkOrigin::Semantic,
                        self.settings.semantic_threshold,
                        self.settings.semantic_limit,
                        deadline,
                    ),
                    self.vector_tier(
                        chatbot_id,
                        embedding,
                        ChunkOrigin::Correction,
                        self.settings.correction_threshold,
                        self.settings.correction_limit,
                        deadline,
                    ),
                );
                let marker = self.settings.correction_marker.as_str();
                let corrections: Vec<_> = corrections
                    .into_iter()
                    .filter(|c| c.content.contains(marker))
                    .collect();
                (semantic, corrections)
            }
            None => (Vec::new(), Vec::new()),
        };

        if regular.is_empty() && !tokens.all.is_empty() {
            attempted.push(ChunkOrigin::Keyword);
            regular = self
                .text_tier(chatbot_id, &tokens.all, ChunkOrigin::Keyword, deadline)
                .await;
        }

        if !tokens.numeric.is_empty() {
            regular.retain(|chunk| tokens.numeric.iter().any(|n| chunk.content.contains(n.as_str())));
            if regular.is_empty() {
                attempted.push(ChunkOrigin::Numeric);
                regular = self
                    .text_tier(chatbot_id, &tokens.numeric, ChunkOrigin::Numeric, deadline)
                    .await;
            }
        }

        let result = merge(corrections, regular, attempted);
        debug!(
            "Retrieved {} chunk(s) for chatbot {} via {:?}",
            result.chunks.len(),
            chatbot_id,
            result.attempted
        );
        result
    }

    async fn vector_tier(
        &self,
        chatbot_id: &str,
        embedding: &[f32],
        origin: ChunkOrigin,
        threshold: f32,
        limit: usize,
        deadline: &RequestDeadline,
    ) -> Vec<RetrievedChunk> {
        let search = self.vectors.query(chatbot_id, embedding, threshold, limit);
        match deadline.run(search).await {
            Ok(Ok(hits)) => hits
                .into_iter()
                .map(|hit| RetrievedChunk {
                    content: hit.content,
                    score: Some(hit.score),
                    origin,
                })
                .collect(),
            Ok(Err(e)) => {
                warn!("Retrieval degraded: {:?} tier failed: {}", origin, e);
                Vec::new()
            }
            Err(_) => {
                warn!("Retrieval degraded: {:?} tier timed out", origin);
                Vec::new()
            }
        }
    }

    /// Pattern search per token, splitting the result budget evenly.
    async fn text_tier(
        &self,
        chatbot_id: &str,
        tokens: &[String],
        origin: ChunkOrigin,
        deadline: &RequestDeadline,
    ) -> Vec<RetrievedChunk> {
        let limit = self.settings.semantic_limit;
        let per_token = limit.div_ceil(tokens.len().max(1));
        let mut found: IndexSet<String> = IndexSet::new();

        for token in tokens {
            if found.len() >= limit {
                break;
            }
            match deadline.run(self.text.search_text(chatbot_id, token, per_token)).await {
                Ok(Ok(hits)) => found.extend(hits),
                Ok(Err(e)) => warn!("Retrieval degraded: {:?} search for '{}' failed: {}", origin, token, e),
                Err(_) => {
                    warn!("Retrieval degraded: {:?} search timed out", origin);
                    break;
                }
            }
        }

        found
            .into_iter()
            .take(limit)
            .map(|content| RetrievedChunk {
                content,
                score: None,
                origin,
            })
            .collect()
    }
}

/// Corrections first, then regular chunks not already present.
fn merge(
    corrections: Vec<RetrievedChunk>,
    regular: Vec<RetrievedChunk>,
    attempted: Vec<ChunkOrigin>,
) -> RetrievalResult {
    let mut seen: IndexSet<String> = IndexSet::new();
    let chunks = corrections
        .into_iter()
        .chain(regular)
        .filter(|chunk| seen.insert(chunk.content.clone()))
        .collect();
    RetrievalResult { chunks, attempted }
}
