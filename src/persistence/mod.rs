//! Persistent vector index for enriched tool texts.
//!
//! One collection maps to one file under the persist directory. Writers
//! replace the whole collection atomically; readers hold an immutable
//! snapshot, so a query never observes a half-written collection.

pub mod format;

pub use format::{CollectionHeader, IndexedCollection, INDEX_EXTENSION, INDEX_MAGIC, INDEX_VERSION};

use crate::error::{AppError, Result};
use crate::inference::SharedProvider;
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Metadata stored alongside each indexed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Registry lookup key
    pub name: String,
    pub source_group: String,
    /// Ordinal of the tool in the ingestion batch
    pub tool_index: usize,
    pub collection: String,
    /// Original tool definition
    pub original_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub metadata: EntryMetadata,
}

/// A query hit: entry plus cosine similarity (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub text: String,
    pub metadata: EntryMetadata,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub collection: String,
    pub persist_directory: PathBuf,
    pub total_documents: usize,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

/// Check a collection name: ASCII alphanumerics, `-`, `_` and `.`, not
/// starting with `.`.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if name.is_empty() || name.starts_with('.') || !valid_chars {
        return Err(AppError::ValidationError(format!(
            "Invalid collection name '{}': use ASCII letters, digits, '-', '_' or '.' (not leading)",
            name
        )));
    }
    Ok(())
}

/// A named collection in a persist directory, bound to an embedding provider.
pub struct VectorIndex {
    persist_dir: PathBuf,
    collection: String,
    provider: SharedProvider,
    snapshot: ArcSwapOption<IndexedCollection>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("persist_dir", &self.persist_dir)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    pub fn new(
        persist_dir: impl Into<PathBuf>,
        collection: impl Into<String>,
        provider: SharedProvider,
    ) -> Result<Self> {
        let collection = collection.into();
        validate_collection_name(&collection)?;

        Ok(Self {
            persist_dir: persist_dir.into(),
            collection,
            provider,
            snapshot: ArcSwapOption::empty(),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    pub fn path(&self) -> PathBuf {
        self.persist_dir
            .join(format!("{}.{}", self.collection, INDEX_EXTENSION))
    }

    /// Whether the collection has been built, in memory or on disk.
    pub fn exists(&self) -> bool {
        self.snapshot.load().is_some() || self.path().is_file()
    }

    /// Embed all texts and replace the collection with exactly these entries.
    ///
    /// Returns the number of entries written.
    pub fn upsert_batch(&self, entries: Vec<(String, EntryMetadata)>) -> Result<usize> {
        let start = std::time::Instant::now();
        let texts: Vec<String> = entries.iter().map(|(text, _)| text.clone()).collect();
        let vectors = self.provider.embed_batch(&texts)?;

        let collection = IndexedCollection::new(
            &self.collection,
            self.provider.model_id(),
            self.provider.dimension(),
            entries,
            vectors,
        )?;
        collection.save(&self.path())?;

        let count = collection.len();
        self.snapshot.store(Some(Arc::new(collection)));

        tracing::info!(
            collection = %self.collection,
            count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Collection replaced"
        );

        Ok(count)
    }

    /// Current collection snapshot, loading it from disk on first use.
    pub fn snapshot(&self) -> Result<Arc<IndexedCollection>> {
        if let Some(collection) = self.snapshot.load_full() {
            return Ok(collection);
        }
        self.reload()
    }

    /// Drop the cached snapshot and read the collection from disk again.
    pub fn reload(&self) -> Result<Arc<IndexedCollection>> {
        self.snapshot.store(None);

        let collection = IndexedCollection::load(&self.path())?
            .ok_or_else(|| AppError::MissingIndex {
                persist_dir: self.persist_dir.clone(),
                collection: self.collection.clone(),
            })?;

        if collection.header.collection != self.collection {
            return Err(AppError::IndexCorrupt(format!(
                "File holds collection '{}', expected '{}'",
                collection.header.collection, self.collection
            )));
        }

        let collection = Arc::new(collection);
        self.snapshot.store(Some(Arc::clone(&collection)));
        Ok(collection)
    }

    /// Up to `k` entries scoring at least `score_threshold`, best first.
    /// Equal scores keep insertion order.
    pub fn query_similar(
        &self,
        text: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredEntry>> {
        let collection = self.snapshot()?;
        let header = &collection.header;

        if header.model_id != self.provider.model_id()
            || header.embedding_dim != self.provider.dimension()
        {
            return Err(AppError::ProviderMismatch {
                index_model: header.model_id.clone(),
                index_dim: header.embedding_dim,
                query_model: self.provider.model_id().to_string(),
                query_dim: self.provider.dimension(),
            });
        }

        if k == 0 || collection.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.provider.embed(text)?;
        if query.len() != header.embedding_dim {
            return Err(AppError::ModelError(format!(
                "Query embedding has {} dimensions, expected {}",
                query.len(),
                header.embedding_dim
            )));
        }

        let mut ranked: Vec<(usize, f32)> = collection
            .scores(&query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score >= score_threshold)
            .collect();

        // sort_by is stable, so ties stay in insertion order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(idx, score)| {
                let entry = &collection.entries[idx];
                ScoredEntry {
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    score,
                }
            })
            .collect())
    }

    pub fn entries(&self) -> Result<Vec<IndexEntry>> {
        Ok(self.snapshot()?.entries.clone())
    }

    pub fn info(&self) -> Result<IndexInfo> {
        let collection = self.snapshot()?;
        Ok(IndexInfo {
            collection: self.collection.clone(),
            persist_directory: self.persist_dir.clone(),
            total_documents: collection.len(),
            embedding_model: collection.header.model_id.clone(),
            embedding_dim: collection.header.embedding_dim,
        })
    }
}
