//! Human-readable summary of an ingested tool set.

use crate::error::Result;
use crate::ingestion::types::StandardizedTool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Maximum description characters kept in a manifest entry.
pub const MANIFEST_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub metadata: ManifestMetadata,
    pub tools: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub total_tools: usize,
    pub persist_directory: String,
    pub collection: String,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub source_group: String,
    pub description_preview: String,
    pub has_parameters: bool,
}

impl ToolManifest {
    pub fn new(
        tools: &[StandardizedTool],
        persist_directory: &Path,
        collection: &str,
        embedding_model: &str,
    ) -> Self {
        Self {
            metadata: ManifestMetadata {
                total_tools: tools.len(),
                persist_directory: persist_directory.display().to_string(),
                collection: collection.to_string(),
                embedding_model: embedding_model.to_string(),
                created_at: Utc::now(),
            },
            tools: tools
                .iter()
                .map(|tool| ManifestEntry {
                    name: tool.name.clone(),
                    source_group: tool.source_group.clone(),
                    description_preview: preview(
                        &tool.original.description,
                        MANIFEST_PREVIEW_CHARS,
                    ),
                    has_parameters: tool.has_parameters(),
                })
                .collect(),
        }
    }

    /// Write as pretty-printed JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)?;

        tracing::info!(
            path = %path.display(),
            total_tools = self.metadata.total_tools,
            "Tool manifest exported"
        );
        Ok(())
    }
}

/// First `max_chars` characters of `text`, with "..." appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
