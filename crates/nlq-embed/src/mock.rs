//! Deterministic mock embedder for tests and degraded environments.

use async_trait::async_trait;

use nlq_core::{Embedder, NlqError, Result};

/// Mock embedder producing deterministic hash-derived vectors.
///
/// Construct with `unavailable()` to exercise keyword-only fallback
/// paths.
pub struct MockEmbedder {
    dimension: usize,
    available: bool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 768,
            available: true,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            available: true,
        }
    }

    /// An embedder that reports unavailable and fails every call.
    pub fn unavailable() -> Self {
        Self {
            dimension: 768,
            available: false,
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.available {
            return Err(NlqError::embedding_unavailable("mock embedder disabled"));
        }

        let hash = text
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut embedding = vec![0.0f32; self.dimension];
        for (i, v) in embedding.iter_mut().enumerate() {
            *v = ((hash.wrapping_mul(i as u64 + 1)) as f32 % 1000.0) / 1000.0 - 0.5;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn available(&self) -> bool {
        self.available
    }
}
