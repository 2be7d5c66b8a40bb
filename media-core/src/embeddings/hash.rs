//! Deterministic hash-based embedder.
//!
//! Token-hash pseudo-embeddings: fast, dependency-free, and stable across
//! runs, which makes them the `local` backend default and the unit-test
//! substrate. Texts sharing tokens land near each other, but the vectors
//! carry no learned semantics; production deployments plug a real model in
//! behind [`Embedder`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use super::similarity::normalize_vector;
use crate::error::Result;
use crate::ports::Embedder;

/// Dependency-free [`Embedder`] producing deterministic unit vectors.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    batch_limit: usize,
}

impl HashEmbedder {
    /// Create an embedder for the given vector dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            batch_limit: crate::constants::DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let digest = hasher.finish();
            let index = (digest % self.dimension as u64) as usize;
            // Alternate signs so unrelated tokens spread across the sphere
            // instead of all pulling toward one orthant.
            let sign = if digest & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        normalize_vector(vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedder-v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}
