//! Deterministic feature-hashing embedder.
//!
//! Needs no model files, so it serves as the secondary provider and as the
//! embedder for tests. Similarity is lexical: texts sharing rare words score
//! high, unrelated texts score near zero.

use crate::error::{AppError, Result};
use crate::inference::provider::EmbeddingProvider;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of",
    "on", "or", "that", "the", "this", "to", "was", "when", "with",
];

pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AppError::ValidationError(
                "Hashing embedder dimension must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            model_id: format!("feature-hash-v1-{}", dimension),
        })
    }

    /// Lower-cased alphanumeric tokens with counts, stop words dropped.
    ///
    /// A BTreeMap keeps accumulation order fixed so colliding buckets sum
    /// identically on every call.
    fn term_counts(text: &str) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        {
            *counts.entry(token).or_insert(0) += 1;
        }
        counts
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for (token, count) in Self::term_counts(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = digest[..8]
                .iter()
                .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
            let bucket = (bucket % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

            vector[bucket] += sign * (1.0 + (count as f32).ln());
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in vector.iter_mut() {
                *val /= norm;
            }
        }

        Ok(vector)
    }
}
