//! Type definitions for the ingestion module.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One input parameter of a tool, in the order its schema declares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    /// JSON schema type, if the schema states one
    pub param_type: Option<String>,
    pub description: Option<String>,
    pub required: bool,
}

/// A raw tool definition as received from a tool source.
///
/// Parsing is lenient: missing fields become `None`/empty rather than errors,
/// and the full record is kept in `raw` for provenance and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name; may be a compound `group__name`
    pub name: String,
    pub description: String,
    /// Parameters in declared order
    pub parameters: Vec<ParameterSpec>,
    /// Origin collection (MCP server, file, provider)
    pub source_group: Option<String>,
    /// Original record
    pub raw: Value,
}

/// A tool record ready for embedding and indexing.
///
/// `enriched_text` is the only text ever embedded for this tool. It is a pure
/// function of the descriptor's name, description, parameters and source group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizedTool {
    /// Display name (compound names have their group prefix removed)
    pub name: String,

    /// Effective source group, e.g. "Github" for `github__create_issue`
    pub source_group: String,

    /// Multi-line description used for embedding
    pub enriched_text: String,

    /// Descriptor this record was derived from
    pub original: ToolDescriptor,
}

impl StandardizedTool {
    pub fn has_parameters(&self) -> bool {
        !self.original.parameters.is_empty()
    }
}
