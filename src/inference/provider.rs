//! Embedding provider abstraction and primary/secondary selection.

use crate::error::{AppError, Result};
use crate::inference::{HashingEmbedder, OnnxEmbedder};
use std::path::PathBuf;
use std::sync::Arc;

/// Text to fixed-size vector.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector, and every vector has `dimension()` components.
pub trait EmbeddingProvider: Send + Sync {
    /// Identity recorded in index headers and checked at query time.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

pub type SharedProvider = Arc<dyn EmbeddingProvider>;

/// How to construct an embedding provider.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedderSpec {
    Onnx {
        name: String,
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        max_length: usize,
        pool_size: usize,
    },
    Hashing {
        dimension: usize,
    },
}

impl EmbedderSpec {
    pub fn label(&self) -> String {
        match self {
            EmbedderSpec::Onnx { name, .. } => format!("onnx:{}", name),
            EmbedderSpec::Hashing { dimension } => format!("hashing:{}", dimension),
        }
    }
}

/// Construct the provider described by `spec`.
pub fn load_provider(spec: &EmbedderSpec) -> Result<SharedProvider> {
    match spec {
        EmbedderSpec::Onnx {
            name,
            model_path,
            tokenizer_path,
            max_length,
            pool_size,
        } => {
            let embedder =
                OnnxEmbedder::load(name, model_path, tokenizer_path, *max_length, *pool_size)?;
            Ok(Arc::new(embedder))
        }
        EmbedderSpec::Hashing { dimension } => Ok(Arc::new(HashingEmbedder::new(*dimension)?)),
    }
}

/// Load the primary provider, substituting the secondary if it fails.
///
/// Substitution is logged at warn level. If neither loads the error is
/// `EmbeddingUnavailable`, which callers treat as fatal.
pub fn init_provider(primary: &EmbedderSpec, secondary: &EmbedderSpec) -> Result<SharedProvider> {
    let primary_error = match load_provider(primary) {
        Ok(provider) => {
            tracing::info!(
                embedder = %primary.label(),
                model_id = provider.model_id(),
                dimension = provider.dimension(),
                "Primary embedding provider ready"
            );
            return Ok(provider);
        }
        Err(e) => e,
    };

    tracing::warn!(
        primary = %primary.label(),
        secondary = %secondary.label(),
        error = %primary_error,
        "Primary embedding provider unavailable, substituting secondary"
    );

    match load_provider(secondary) {
        Ok(provider) => {
            tracing::info!(
                embedder = %secondary.label(),
                model_id = provider.model_id(),
                dimension = provider.dimension(),
                "Secondary embedding provider ready"
            );
            Ok(provider)
        }
        Err(secondary_error) => Err(AppError::EmbeddingUnavailable(format!(
            "primary {} failed: {}; secondary {} failed: {}",
            primary.label(),
            primary_error,
            secondary.label(),
            secondary_error
        ))),
    }
}
