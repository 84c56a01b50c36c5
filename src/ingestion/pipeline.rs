//! End-to-end ingestion: tool definitions in, persisted collection out.

use crate::error::{AppError, Result};
use crate::inference::SharedProvider;
use crate::ingestion::manifest::ToolManifest;
use crate::ingestion::samples::sample_tools;
use crate::ingestion::standardizer::{parse_tool_definitions, ToolStandardizer};
use crate::ingestion::types::{StandardizedTool, ToolDescriptor};
use crate::persistence::{EntryMetadata, VectorIndex};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub total_tools: usize,
    pub persist_directory: PathBuf,
    pub embedding_model: String,
}

/// Accumulates tool definitions and builds them into a vector index.
pub struct IngestionPipeline {
    persist_dir: PathBuf,
    provider: SharedProvider,
    standardizer: ToolStandardizer,
}

impl IngestionPipeline {
    pub fn new(persist_dir: impl Into<PathBuf>, provider: SharedProvider) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            provider,
            standardizer: ToolStandardizer::new(),
        }
    }

    pub fn tools(&self) -> &[StandardizedTool] {
        self.standardizer.tools()
    }

    /// Standardize and accumulate descriptors. Returns how many were added.
    pub fn load(&mut self, descriptors: impl IntoIterator<Item = ToolDescriptor>) -> usize {
        self.load_with_group(descriptors, None)
    }

    fn load_with_group(
        &mut self,
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
        source_group: Option<&str>,
    ) -> usize {
        let before = self.standardizer.len();
        for descriptor in descriptors {
            self.standardizer.add(descriptor, source_group);
        }
        self.standardizer.len() - before
    }

    /// Load a parsed tool-definition document.
    pub fn load_json(&mut self, json: &Value) -> Result<usize> {
        let descriptors = parse_tool_definitions(json)?;
        Ok(self.load(descriptors))
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let json = read_json(path)?;
        let count = self.load_json(&json)?;
        tracing::info!(path = %path.display(), count, "Loaded tool definitions");
        Ok(count)
    }

    /// Load every `*.json` file in `dir`, in file-name order. Each file's stem
    /// becomes the source group of its tools. Unreadable files are skipped.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(AppError::ValidationError(format!(
                "Tools directory not found: {}",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut total = 0;
        for path in files {
            let group = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let descriptors = match read_json(&path).and_then(|json| parse_tool_definitions(&json)) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable tools file");
                    continue;
                }
            };

            let count = self.load_with_group(descriptors, Some(&group));
            tracing::debug!(path = %path.display(), source_group = %group, count, "Loaded tools file");
            total += count;
        }

        tracing::info!(dir = %dir.display(), total, "Loaded tools directory");
        Ok(total)
    }

    pub fn load_sample_tools(&mut self) -> usize {
        let samples = sample_tools();
        let count = samples.len();
        for (descriptor, group) in samples {
            self.standardizer.add(descriptor, Some(&group));
        }
        tracing::info!(count, "Loaded sample tools");
        count
    }

    /// Build (or rebuild) `collection` from the loaded tools and return the
    /// index bound to it.
    pub fn build_index(&self, collection: &str) -> Result<Arc<VectorIndex>> {
        let index = VectorIndex::new(&self.persist_dir, collection, Arc::clone(&self.provider))?;
        self.build_into(&index)?;
        Ok(Arc::new(index))
    }

    /// Replace the contents of an existing index with the loaded tools.
    ///
    /// Readers holding the same index observe the swap atomically.
    pub fn build_into(&self, index: &VectorIndex) -> Result<usize> {
        let tools = self.standardizer.tools();
        if tools.is_empty() {
            return Err(AppError::NoToolsLoaded);
        }

        fs::create_dir_all(index.persist_dir())?;

        let entries: Vec<(String, EntryMetadata)> = tools
            .iter()
            .enumerate()
            .map(|(tool_index, tool)| {
                (
                    tool.enriched_text.clone(),
                    EntryMetadata {
                        name: tool.name.clone(),
                        source_group: tool.source_group.clone(),
                        tool_index,
                        collection: index.collection_name().to_string(),
                        original_schema: tool.original.raw.clone(),
                    },
                )
            })
            .collect();

        let count = index.upsert_batch(entries)?;

        metrics::counter!("index_builds_total").increment(1);
        tracing::info!(
            collection = index.collection_name(),
            persist_dir = %index.persist_dir().display(),
            count,
            "Index built"
        );

        Ok(count)
    }

    pub fn manifest(&self, collection: &str) -> ToolManifest {
        ToolManifest::new(
            self.standardizer.tools(),
            &self.persist_dir,
            collection,
            self.provider.model_id(),
        )
    }

    pub fn export_manifest(&self, path: &Path, collection: &str) -> Result<()> {
        self.manifest(collection).write(path)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            total_tools: self.standardizer.len(),
            persist_directory: self.persist_dir.clone(),
            embedding_model: self.provider.model_id().to_string(),
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        AppError::ValidationError(format!("Invalid JSON in {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::HashingEmbedder;
    use serde_json::json;
    use tempfile::tempdir;

    fn pipeline(dir: &Path) -> IngestionPipeline {
        IngestionPipeline::new(dir, Arc::new(HashingEmbedder::new(256).unwrap()))
    }

    #[test]
    fn test_build_without_tools_fails_fast() {
        let dir = tempdir().unwrap();
        let err = pipeline(dir.path()).build_index("tools").unwrap_err();
        assert!(matches!(err, AppError::NoToolsLoaded));
        assert!(!dir.path().join("tools.tsidx").exists());
    }

    #[test]
    fn test_sample_tools_build_and_query() {
        let dir = tempdir().unwrap();
        let mut pipeline = pipeline(&dir.path().join("nested"));
        assert_eq!(pipeline.load_sample_tools(), 5);

        let index = pipeline.build_index("samples").unwrap();
        assert!(dir.path().join("nested").join("samples.tsidx").is_file());

        let hits = index.query_similar("send an email message", 1, 0.0).unwrap();
        assert_eq!(hits[0].metadata.name, "send_email");
        assert_eq!(hits[0].metadata.source_group, "Sample Server 4");
        assert_eq!(hits[0].metadata.tool_index, 3);
        assert_eq!(hits[0].metadata.collection, "samples");
    }

    #[test]
    fn test_rebuild_replaces_entries() {
        let dir = tempdir().unwrap();
        let mut first = pipeline(dir.path());
        first.load_sample_tools();
        first.build_index("tools").unwrap();

        let mut second = pipeline(dir.path());
        second
            .load_json(&json!([{"name": "only_tool", "description": "The only tool"}]))
            .unwrap();
        let index = second.build_index("tools").unwrap();

        assert_eq!(index.info().unwrap().total_documents, 1);
    }

    #[test]
    fn test_load_file_splits_compound_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.json");
        fs::write(
            &path,
            json!({"tools": [{"name": "github__create_issue", "description": "Create an issue"}]})
                .to_string(),
        )
        .unwrap();

        let mut pipeline = pipeline(dir.path());
        assert_eq!(pipeline.load_file(&path).unwrap(), 1);
        assert_eq!(pipeline.tools()[0].name, "create_issue");
        assert_eq!(pipeline.tools()[0].source_group, "Github");
    }

    #[test]
    fn test_load_directory_uses_file_stems() {
        let dir = tempdir().unwrap();
        let tools_dir = dir.path().join("tools");
        fs::create_dir(&tools_dir).unwrap();
        fs::write(
            tools_dir.join("b_server.json"),
            json!([{"name": "beta"}]).to_string(),
        )
        .unwrap();
        fs::write(
            tools_dir.join("a_server.json"),
            json!([{"name": "alpha"}, {"name": "gamma"}]).to_string(),
        )
        .unwrap();
        fs::write(tools_dir.join("broken.json"), "{not json").unwrap();
        fs::write(tools_dir.join("notes.txt"), "ignored").unwrap();

        let mut pipeline = pipeline(dir.path());
        assert_eq!(pipeline.load_directory(&tools_dir).unwrap(), 3);

        let tools = pipeline.tools();
        assert_eq!(tools[0].name, "alpha");
        assert_eq!(tools[0].source_group, "a_server");
        assert_eq!(tools[2].name, "beta");
        assert_eq!(tools[2].source_group, "b_server");
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempdir().unwrap();
        let result = pipeline(dir.path()).load_directory(&dir.path().join("absent"));
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_stats_and_manifest() {
        let dir = tempdir().unwrap();
        let mut pipeline = pipeline(dir.path());
        pipeline.load_sample_tools();

        let stats = pipeline.stats();
        assert_eq!(stats.total_tools, 5);
        assert_eq!(stats.embedding_model, "feature-hash-v1-256");

        let manifest = pipeline.manifest("tools");
        assert_eq!(manifest.metadata.total_tools, 5);
        assert_eq!(manifest.metadata.collection, "tools");
        assert!(manifest.tools.iter().all(|t| t.has_parameters));
    }
}
