//! Query-time tool retrieval with graceful degradation.
//!
//! The engine never leaves a caller empty-handed because of a broken index:
//! recoverable failures (missing or corrupt collection, provider mismatch,
//! model errors, timeouts) answer with the registry's fallback tools and a
//! `Degraded` status instead of an error.

use crate::error::{AppError, Result};
use crate::inference::{init_provider, EmbedderSpec};
use crate::ingestion::preview;
use crate::persistence::{ScoredEntry, VectorIndex};
use crate::retrieval::registry::{ToolHandle, ToolRegistry};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Score given to fallback tools in scored results.
pub const FALLBACK_SCORE: f32 = 0.0;

/// Description characters kept in an explanation.
pub const EXPLAIN_PREVIEW_CHARS: usize = 150;

pub const RETRIEVAL_STRATEGY: &str = "semantic_similarity";

/// How a result list was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalStatus {
    /// Every tool came from the index
    Matched,
    /// Index results were topped up with fallback tools
    Padded { matched: usize, padded: usize },
    /// The index answered but nothing survived filtering
    NoMatches,
    /// The index could not be queried; fallback tools were used
    Degraded { error: String, reason: String },
}

impl RetrievalStatus {
    fn degraded(err: &AppError) -> Self {
        RetrievalStatus::Degraded {
            error: err.kind().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RetrievalStatus::Degraded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RetrievalStatus::Matched => "matched",
            RetrievalStatus::Padded { .. } => "padded",
            RetrievalStatus::NoMatches => "no_matches",
            RetrievalStatus::Degraded { .. } => "degraded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Retrieval<T> {
    pub tools: Vec<Arc<T>>,
    pub status: RetrievalStatus,
}

impl<T: ToolHandle> Retrieval<T> {
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRetrieval<T> {
    pub tools: Vec<(Arc<T>, f32)>,
    pub status: RetrievalStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainedTool {
    pub name: String,
    pub score: f32,
    pub description_preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalExplanation {
    pub query: String,
    pub retrieval_strategy: &'static str,
    pub embedding_model: String,
    pub retrieved_tools: Vec<ExplainedTool>,
    pub status: RetrievalStatus,
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub query_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_k: 5,
            query_timeout: Duration::from_secs(5),
        }
    }
}

pub struct RetrievalEngine {
    index: Arc<VectorIndex>,
    settings: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(index: Arc<VectorIndex>, settings: RetrievalSettings) -> Self {
        Self { index, settings }
    }

    /// Bind to a collection, initializing the embedding provider.
    ///
    /// Fails with `EmbeddingUnavailable` when neither provider loads. A
    /// collection that does not exist yet is not an error here; queries
    /// degrade until it is built.
    pub fn open(
        persist_dir: &Path,
        collection: &str,
        primary: &EmbedderSpec,
        secondary: &EmbedderSpec,
        settings: RetrievalSettings,
    ) -> Result<Self> {
        let provider = init_provider(primary, secondary)?;
        let index = VectorIndex::new(persist_dir, collection, provider)?;
        Ok(Self::new(Arc::new(index), settings))
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn model_id(&self) -> &str {
        self.index.provider().model_id()
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    fn resolve_k(&self, k: Option<usize>) -> Result<usize> {
        match k.unwrap_or(self.settings.default_k) {
            0 => Err(AppError::ValidationError("k must be at least 1".to_string())),
            k => Ok(k),
        }
    }

    /// Run the index query on the blocking pool, bounded by the query timeout.
    pub(crate) async fn candidates(
        &self,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredEntry>> {
        let index = Arc::clone(&self.index);
        let query = query.to_string();
        let timeout = self.settings.query_timeout;

        match tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || index.query_similar(&query, k, score_threshold)),
        )
        .await
        {
            Err(_) => Err(AppError::QueryTimeout(timeout.as_millis() as u64)),
            Ok(Err(e)) => Err(AppError::ModelError(format!("Index query task failed: {}", e))),
            Ok(Ok(result)) => result,
        }
    }

    /// Candidates resolved against the registry, at most one per name.
    ///
    /// Candidates arrive best-first, so the first occurrence of a name is its
    /// best-scoring one.
    fn resolve<T: ToolHandle>(
        registry: &ToolRegistry<T>,
        candidates: Vec<ScoredEntry>,
    ) -> Vec<(Arc<T>, f32)> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let handle = registry.get(&candidate.metadata.name)?;
                if seen.insert(candidate.metadata.name) {
                    Some((Arc::clone(handle), candidate.score))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Scored lookup shared by every retrieval entry point.
    ///
    /// Recoverable failures become `Degraded` with no tools; the caller
    /// decides how to fill in.
    async fn lookup<T: ToolHandle>(
        &self,
        registry: &ToolRegistry<T>,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<(Vec<(Arc<T>, f32)>, Option<RetrievalStatus>)> {
        let start = Instant::now();
        metrics::counter!("retrieval_requests_total").increment(1);

        let outcome = match self.candidates(query, k, score_threshold).await {
            Ok(candidates) => {
                let candidate_count = candidates.len();
                let resolved = Self::resolve(registry, candidates);
                tracing::debug!(
                    query,
                    k,
                    candidates = candidate_count,
                    resolved = resolved.len(),
                    "Index query completed"
                );
                Ok((resolved, None))
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    query,
                    error = %e,
                    kind = e.kind(),
                    "Retrieval failed, using fallback tools"
                );
                metrics::counter!("retrieval_fallback_total", "reason" => e.kind()).increment(1);
                Ok((Vec::new(), Some(RetrievalStatus::degraded(&e))))
            }
            Err(e) => Err(e),
        };

        metrics::histogram!("retrieval_latency_ms").record(start.elapsed().as_millis() as f64);
        outcome
    }

    /// The `k` most relevant registered tools for `query`.
    ///
    /// Falls back to the registry's fallback tools when nothing matches or the
    /// index fails recoverably, and pads short result lists with fallback
    /// tools not already present.
    pub async fn get_relevant_tools<T: ToolHandle>(
        &self,
        registry: &ToolRegistry<T>,
        query: &str,
        k: Option<usize>,
        score_threshold: f32,
    ) -> Result<Retrieval<T>> {
        let k = self.resolve_k(k)?;
        let (resolved, failure) = self.lookup(registry, query, k, score_threshold).await?;

        if let Some(status) = failure {
            return Ok(Retrieval {
                tools: registry.fallback_prefix(k),
                status,
            });
        }

        if resolved.is_empty() {
            tracing::warn!(query, "No relevant tools found, using fallback tools");
            metrics::counter!("retrieval_fallback_total", "reason" => "no_matches").increment(1);
            return Ok(Retrieval {
                tools: registry.fallback_prefix(k),
                status: RetrievalStatus::NoMatches,
            });
        }

        let mut tools: Vec<Arc<T>> = resolved.into_iter().map(|(tool, _)| tool).collect();
        let matched = tools.len();

        if matched < k {
            let present: HashSet<String> = tools.iter().map(|t| t.name().to_string()).collect();
            tools.extend(
                registry
                    .fallback()
                    .iter()
                    .filter(|t| !present.contains(t.name()))
                    .take(k - matched)
                    .cloned(),
            );
        }

        let padded = tools.len() - matched;
        let status = if padded > 0 {
            RetrievalStatus::Padded { matched, padded }
        } else {
            RetrievalStatus::Matched
        };

        tracing::info!(query, k, matched, padded, "Tools retrieved");
        Ok(Retrieval { tools, status })
    }

    /// Like `get_relevant_tools` but with scores and without padding.
    ///
    /// On recoverable failure the fallback tools are returned with
    /// `FALLBACK_SCORE`.
    pub async fn get_relevant_tools_with_scores<T: ToolHandle>(
        &self,
        registry: &ToolRegistry<T>,
        query: &str,
        k: Option<usize>,
        score_threshold: f32,
    ) -> Result<ScoredRetrieval<T>> {
        let k = self.resolve_k(k)?;
        let (resolved, failure) = self.lookup(registry, query, k, score_threshold).await?;

        if let Some(status) = failure {
            return Ok(ScoredRetrieval {
                tools: registry
                    .fallback_prefix(k)
                    .into_iter()
                    .map(|tool| (tool, FALLBACK_SCORE))
                    .collect(),
                status,
            });
        }

        let status = if resolved.is_empty() {
            RetrievalStatus::NoMatches
        } else {
            RetrievalStatus::Matched
        };

        Ok(ScoredRetrieval {
            tools: resolved,
            status,
        })
    }

    /// Retrieve with the keywords joined into one query.
    pub async fn search_by_keywords<T: ToolHandle, S: AsRef<str>>(
        &self,
        registry: &ToolRegistry<T>,
        keywords: &[S],
        k: Option<usize>,
    ) -> Result<Retrieval<T>> {
        let query = keywords
            .iter()
            .map(|k| k.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.get_relevant_tools(registry, &query, k, 0.0).await
    }

    /// Scored results with enough context to see why they were chosen.
    pub async fn explain_retrieval<T: ToolHandle>(
        &self,
        registry: &ToolRegistry<T>,
        query: &str,
        k: Option<usize>,
    ) -> Result<RetrievalExplanation> {
        let scored = self
            .get_relevant_tools_with_scores(registry, query, k, 0.0)
            .await?;

        let retrieved_tools = scored
            .tools
            .iter()
            .map(|(tool, score)| ExplainedTool {
                name: tool.name().to_string(),
                score: *score,
                description_preview: preview(tool.description(), EXPLAIN_PREVIEW_CHARS),
            })
            .collect();

        Ok(RetrievalExplanation {
            query: query.to_string(),
            retrieval_strategy: RETRIEVAL_STRATEGY,
            embedding_model: self.model_id().to_string(),
            retrieved_tools,
            status: scored.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{EmbeddingProvider, HashingEmbedder};
    use crate::persistence::EntryMetadata;
    use crate::retrieval::RegisteredTool;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    fn tool(name: &str) -> Arc<RegisteredTool> {
        Arc::new(RegisteredTool {
            name: name.to_string(),
            source_group: "Test".to_string(),
            description: format!("The {} tool", name),
            raw_definition: Value::Null,
        })
    }

    fn entry(name: &str, text: &str, i: usize) -> (String, EntryMetadata) {
        (
            text.to_string(),
            EntryMetadata {
                name: name.to_string(),
                source_group: "Test".to_string(),
                tool_index: i,
                collection: "tools".to_string(),
                original_schema: json!({"name": name}),
            },
        )
    }

    fn engine(entries: Vec<(String, EntryMetadata)>) -> (TempDir, RetrievalEngine) {
        let dir = tempdir().unwrap();
        let provider = Arc::new(HashingEmbedder::new(512).unwrap());
        let index = VectorIndex::new(dir.path(), "tools", provider).unwrap();
        if !entries.is_empty() {
            index.upsert_batch(entries).unwrap();
        }
        (dir, RetrievalEngine::new(Arc::new(index), RetrievalSettings::default()))
    }

    fn registry(names: &[&str], fallback: &[&str]) -> ToolRegistry<RegisteredTool> {
        let mut registry = ToolRegistry::new();
        registry.register_tools(names.iter().map(|n| tool(n)));
        registry.set_fallback_tools(fallback.iter().map(|n| tool(n)));
        registry
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let (_dir, engine) = engine(vec![]);
        let result = engine
            .get_relevant_tools(&registry(&[], &[]), "q", Some(0), 0.0)
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_missing_index_degrades_to_fallback() {
        let (_dir, engine) = engine(vec![]);
        let registry = registry(&[], &["f1", "f2", "f3"]);

        let result = engine
            .get_relevant_tools(&registry, "anything", Some(2), 0.0)
            .await
            .unwrap();

        assert_eq!(result.names(), vec!["f1", "f2"]);
        assert!(result.status.is_degraded());
        if let RetrievalStatus::Degraded { error, .. } = &result.status {
            assert_eq!(error, "missing_index");
        }
    }

    #[tokio::test]
    async fn test_unregistered_candidates_dropped() {
        let (_dir, engine) = engine(vec![
            entry("git_status", "git status repository", 0),
            entry("ghost", "git status ghost", 1),
        ]);
        let registry = registry(&["git_status"], &[]);

        let result = engine
            .get_relevant_tools(&registry, "git status", Some(5), 0.0)
            .await
            .unwrap();
        assert_eq!(result.names(), vec!["git_status"]);
        assert_eq!(result.status, RetrievalStatus::Matched);
    }

    #[tokio::test]
    async fn test_duplicate_names_keep_best_occurrence() {
        let (_dir, engine) = engine(vec![
            entry("dup", "unrelated words entirely", 0),
            entry("dup", "git status", 1),
            entry("other", "git log", 2),
        ]);
        let registry = registry(&["dup", "other"], &[]);

        let scored = engine
            .get_relevant_tools_with_scores(&registry, "git status", Some(3), -1.0)
            .await
            .unwrap();

        let names: Vec<&str> = scored.tools.iter().map(|(t, _)| t.name()).collect();
        assert_eq!(names, vec!["dup", "other"]);
        assert!((scored.tools[0].1 - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_no_matches_uses_fallback() {
        let (_dir, engine) = engine(vec![entry("git_status", "git status", 0)]);
        let registry = registry(&["git_status"], &["f1"]);

        let result = engine
            .get_relevant_tools(&registry, "send email", Some(3), 0.6)
            .await
            .unwrap();
        assert_eq!(result.names(), vec!["f1"]);
        assert_eq!(result.status, RetrievalStatus::NoMatches);
    }

    #[tokio::test]
    async fn test_padding_skips_present_names() {
        let (_dir, engine) = engine(vec![entry("git_status", "git status", 0)]);
        let registry = registry(&["git_status"], &["git_status", "f1", "f2"]);

        let result = engine
            .get_relevant_tools(&registry, "git status", Some(3), 0.5)
            .await
            .unwrap();
        assert_eq!(result.names(), vec!["git_status", "f1", "f2"]);
        assert_eq!(
            result.status,
            RetrievalStatus::Padded {
                matched: 1,
                padded: 2
            }
        );
    }

    #[tokio::test]
    async fn test_scored_failure_uses_sentinel_score() {
        let (_dir, engine) = engine(vec![]);
        let registry = registry(&[], &["f1", "f2"]);

        let scored = engine
            .get_relevant_tools_with_scores(&registry, "q", None, 0.0)
            .await
            .unwrap();
        assert_eq!(scored.tools.len(), 2);
        assert!(scored.tools.iter().all(|(_, s)| *s == FALLBACK_SCORE));
        assert!(scored.status.is_degraded());
    }

    /// Hashing embedder whose single-text `embed` (the query path) stalls.
    struct StallingEmbedder {
        inner: HashingEmbedder,
        delay: Duration,
    }

    impl EmbeddingProvider for StallingEmbedder {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            std::thread::sleep(self.delay);
            self.inner.embed(text)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.inner.embed_batch(texts)
        }
    }

    #[tokio::test]
    async fn test_slow_query_times_out_to_fallback() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(StallingEmbedder {
            inner: HashingEmbedder::new(512).unwrap(),
            delay: Duration::from_millis(300),
        });
        let index = VectorIndex::new(dir.path(), "tools", provider).unwrap();
        index
            .upsert_batch(vec![entry("git_status", "git status", 0)])
            .unwrap();
        let engine = RetrievalEngine::new(
            Arc::new(index),
            RetrievalSettings {
                default_k: 5,
                query_timeout: Duration::from_millis(50),
            },
        );
        let registry = registry(&["git_status"], &["f1", "f2", "f3"]);

        let result = engine
            .get_relevant_tools(&registry, "git status", Some(2), 0.0)
            .await
            .unwrap();
        assert_eq!(result.names(), vec!["f1", "f2"]);
        match &result.status {
            RetrievalStatus::Degraded { error, .. } => assert_eq!(error, "query_timeout"),
            other => panic!("expected degraded status, got {other:?}"),
        }

        let scored = engine
            .get_relevant_tools_with_scores(&registry, "git status", Some(2), 0.0)
            .await
            .unwrap();
        let pairs: Vec<(&str, f32)> = scored.tools.iter().map(|(t, s)| (t.name(), *s)).collect();
        assert_eq!(pairs, vec![("f1", FALLBACK_SCORE), ("f2", FALLBACK_SCORE)]);
        assert!(scored.status.is_degraded());
    }

    #[tokio::test]
    async fn test_search_by_keywords_joins_terms() {
        let (_dir, engine) = engine(vec![
            entry("git_status", "git status repository", 0),
            entry("send_email", "send email message", 1),
        ]);
        let registry = registry(&["git_status", "send_email"], &[]);

        let result = engine
            .search_by_keywords(&registry, &["email", "message"], Some(1))
            .await
            .unwrap();
        assert_eq!(result.names(), vec!["send_email"]);
    }

    #[tokio::test]
    async fn test_explain_reports_model_and_previews() {
        let (_dir, engine) = engine(vec![entry("git_status", "git status", 0)]);
        let registry = registry(&["git_status"], &[]);

        let explanation = engine
            .explain_retrieval(&registry, "git status", Some(1))
            .await
            .unwrap();
        assert_eq!(explanation.retrieval_strategy, "semantic_similarity");
        assert_eq!(explanation.embedding_model, "feature-hash-v1-512");
        assert_eq!(explanation.retrieved_tools[0].name, "git_status");
        assert_eq!(
            explanation.retrieved_tools[0].description_preview,
            "The git_status tool"
        );
    }

    #[test]
    fn test_status_serializes_with_kind() {
        let json = serde_json::to_value(RetrievalStatus::Padded {
            matched: 2,
            padded: 3,
        })
        .unwrap();
        assert_eq!(json, json!({"kind": "padded", "matched": 2, "padded": 3}));
        assert_eq!(
            serde_json::to_value(RetrievalStatus::NoMatches).unwrap(),
            json!({"kind": "no_matches"})
        );
    }
}
