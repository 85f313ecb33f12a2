//! Fixed embedder - the same vector for every input.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use brain_core::{BrainError, Embedder};

/// An embedder returning a fixed vector, or always failing.
#[derive(Debug)]
pub struct FixedEmbedder {
    vector: Option<Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    /// Always return `vector`.
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with [`BrainError::Unavailable`].
    pub fn failing() -> Self {
        Self {
            vector: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, BrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector
            .clone()
            .ok_or_else(|| BrainError::Unavailable("embedding service down".to_string()))
    }
}
