//! Caller-owned mapping from retrieved names to live tool handles.

use crate::ingestion::StandardizedTool;
use crate::persistence::IndexEntry;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Anything the engine can hand back as a retrieved tool.
pub trait ToolHandle: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }
}

/// Registered tools by name plus the ordered fallback set.
///
/// The index stores names only; a retrieved name with no registered handle
/// is dropped from results.
pub struct ToolRegistry<T> {
    tools: HashMap<String, Arc<T>>,
    fallback: Vec<Arc<T>>,
}

impl<T: ToolHandle> ToolRegistry<T> {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            fallback: Vec::new(),
        }
    }

    /// Replace every registered tool. On duplicate names the last one wins.
    pub fn register_tools(&mut self, tools: impl IntoIterator<Item = Arc<T>>) {
        self.tools = tools
            .into_iter()
            .map(|tool| (tool.name().to_string(), tool))
            .collect();
    }

    /// Set the tools returned, in this order, when retrieval degrades.
    pub fn set_fallback_tools(&mut self, tools: impl IntoIterator<Item = Arc<T>>) {
        self.fallback = tools.into_iter().collect();
    }

    pub fn get(&self, name: &str) -> Option<&Arc<T>> {
        self.tools.get(name)
    }

    pub fn fallback(&self) -> &[Arc<T>] {
        &self.fallback
    }

    /// The first `k` fallback tools.
    pub fn fallback_prefix(&self, k: usize) -> Vec<Arc<T>> {
        self.fallback.iter().take(k).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: ToolHandle> Default for ToolRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ToolRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            tools: self.tools.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

/// Tool handle used by the HTTP service: the tool's identity and its original
/// definition, which callers use to invoke it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredTool {
    pub name: String,
    pub source_group: String,
    pub description: String,
    pub raw_definition: Value,
}

impl ToolHandle for RegisteredTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl From<&StandardizedTool> for RegisteredTool {
    fn from(tool: &StandardizedTool) -> Self {
        Self {
            name: tool.name.clone(),
            source_group: tool.source_group.clone(),
            description: tool.original.description.clone(),
            raw_definition: tool.original.raw.clone(),
        }
    }
}

impl From<&IndexEntry> for RegisteredTool {
    fn from(entry: &IndexEntry) -> Self {
        let description = entry
            .metadata
            .original_schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            name: entry.metadata.name.clone(),
            source_group: entry.metadata.source_group.clone(),
            description,
            raw_definition: entry.metadata.original_schema.clone(),
        }
    }
}
