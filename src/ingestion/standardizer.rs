//! Standardization of raw tool definitions into embeddable records.
//!
//! Tool sources hand us loosely-shaped JSON. This module parses it leniently
//! into [`ToolDescriptor`]s and turns each descriptor into a
//! [`StandardizedTool`] whose `enriched_text` carries the name, source,
//! description, parameters, derived keywords and usage hints.

use crate::error::{AppError, Result};
use crate::ingestion::keywords::{extract_keywords, infer_use_cases};
use crate::ingestion::types::{ParameterSpec, StandardizedTool, ToolDescriptor};
use serde_json::Value;
use std::collections::HashSet;

/// Name used when a descriptor carries no usable name.
pub const UNNAMED_TOOL: &str = "unnamed_tool";

/// Source group used when nothing else identifies the origin.
pub const UNKNOWN_SOURCE: &str = "unknown";

const NO_DESCRIPTION: &str = "No description provided";
const NO_PARAM_DESCRIPTION: &str = "No description";
const UNKNOWN_PARAM_TYPE: &str = "unknown";

/// Separator between source group and tool name in compound names.
const GROUP_SEPARATOR: &str = "__";

/// Parse a tool definitions document into descriptors.
///
/// Accepts a bare list of records, an object wrapping the list under `tools`,
/// or an MCP `list_tools` JSON-RPC response (`result.tools`). Records that are
/// not JSON objects are logged and skipped.
pub fn parse_tool_definitions(json: &Value) -> Result<Vec<ToolDescriptor>> {
    let records = extract_tools_array(json)?;

    let mut descriptors = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        if record.is_object() {
            descriptors.push(ToolDescriptor::from_json(record));
        } else {
            tracing::warn!(index = idx, "Skipping tool definition that is not an object");
        }
    }

    tracing::debug!(
        total = records.len(),
        parsed = descriptors.len(),
        "Tool definitions parsed"
    );

    Ok(descriptors)
}

fn extract_tools_array(json: &Value) -> Result<&Vec<Value>> {
    if let Some(list) = json.as_array() {
        return Ok(list);
    }

    json.get("tools")
        .or_else(|| json.get("result").and_then(|r| r.get("tools")))
        .and_then(|t| t.as_array())
        .ok_or_else(|| {
            AppError::ValidationError(
                "Tool definitions must be a list or an object with a 'tools' list".into(),
            )
        })
}

impl ToolDescriptor {
    /// Build a descriptor from a JSON record without failing on missing fields.
    pub fn from_json(record: &Value) -> Self {
        let name = record
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let description = record
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let source_group = record
            .get("sourceGroup")
            .or_else(|| record.get("server"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from);

        Self {
            name,
            description,
            parameters: parse_parameters(record.get("inputSchema")),
            source_group,
            raw: record.clone(),
        }
    }
}

/// Read `inputSchema.properties` in declared order.
fn parse_parameters(input_schema: Option<&Value>) -> Vec<ParameterSpec> {
    let Some(schema) = input_schema else {
        return Vec::new();
    };

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Vec::new();
    };

    let required: HashSet<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| ParameterSpec {
            name: name.clone(),
            param_type: prop.get("type").and_then(|t| t.as_str()).map(String::from),
            description: prop
                .get("description")
                .and_then(|d| d.as_str())
                .map(String::from),
            required: required.contains(name.as_str()),
        })
        .collect()
}

/// Accumulates standardized tools in insertion order.
///
/// Duplicate names may coexist; consumers that need one tool per name
/// resolve them by position.
#[derive(Debug, Default)]
pub struct ToolStandardizer {
    tools: Vec<StandardizedTool>,
}

impl ToolStandardizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standardize a descriptor and append it to the collection.
    pub fn add(
        &mut self,
        descriptor: ToolDescriptor,
        source_group_override: Option<&str>,
    ) -> &StandardizedTool {
        let tool = standardize(descriptor, source_group_override);
        self.tools.push(tool);
        &self.tools[self.tools.len() - 1]
    }

    pub fn extend(&mut self, tools: impl IntoIterator<Item = StandardizedTool>) {
        self.tools.extend(tools);
    }

    pub fn tools(&self) -> &[StandardizedTool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Turn a descriptor into a [`StandardizedTool`].
///
/// A compound `group__name` is split into source group and display name; an
/// explicit `source_group_override` always wins over the prefix. Never fails:
/// missing fields degrade to placeholder text.
pub fn standardize(descriptor: ToolDescriptor, source_group_override: Option<&str>) -> StandardizedTool {
    let raw_name = descriptor.name.trim();
    let raw_name = if raw_name.is_empty() { UNNAMED_TOOL } else { raw_name };

    let (prefix_group, name) = match raw_name.split_once(GROUP_SEPARATOR) {
        Some((group, rest)) if !group.is_empty() && !rest.is_empty() => {
            (Some(format_group_name(group)), rest.to_string())
        }
        _ => (None, raw_name.to_string()),
    };

    let source_group = source_group_override
        .map(String::from)
        .or(prefix_group)
        .or_else(|| descriptor.source_group.clone())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let enriched_text = build_enriched_text(
        &name,
        &descriptor.description,
        &descriptor.parameters,
        &source_group,
    );

    StandardizedTool {
        name,
        source_group,
        enriched_text,
        original: descriptor,
    }
}

/// `my_server` -> `My Server`, `web-tools` -> `Web-Tools`
///
/// A letter starts a word unless it directly follows another letter.
fn format_group_name(group: &str) -> String {
    let mut formatted = String::with_capacity(group.len());
    let mut after_letter = false;
    for c in group.chars() {
        let c = if c == '_' { ' ' } else { c };
        if after_letter {
            formatted.extend(c.to_lowercase());
        } else {
            formatted.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    formatted
}

/// Construct the text that gets embedded for a tool.
///
/// Format (one item per line):
/// `Tool:`, `Source:`, `Description:`, optional `Parameters:` block,
/// optional `Keywords:`, and `Use when:`.
fn build_enriched_text(
    name: &str,
    description: &str,
    parameters: &[ParameterSpec],
    source_group: &str,
) -> String {
    let description = if description.trim().is_empty() {
        NO_DESCRIPTION
    } else {
        description
    };

    let mut lines = vec![
        format!("Tool: {}", name),
        format!("Source: {} tool source", source_group),
        format!("Description: {}", description),
    ];

    if !parameters.is_empty() {
        lines.push("Parameters:".to_string());
        lines.extend(parameters.iter().map(format_param));
    }

    let keywords = extract_keywords(name, description);
    if !keywords.is_empty() {
        lines.push(format!(
            "Keywords: {}",
            keywords.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    lines.push(format!("Use when: {}", infer_use_cases(name)));

    lines.join("\n")
}

fn format_param(param: &ParameterSpec) -> String {
    format!(
        "- {} ({}): {}",
        param.name,
        param.param_type.as_deref().unwrap_or(UNKNOWN_PARAM_TYPE),
        param.description.as_deref().unwrap_or(NO_PARAM_DESCRIPTION)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: Value) -> ToolDescriptor {
        ToolDescriptor::from_json(&value)
    }

    #[test]
    fn test_parse_bare_list() {
        let json = json!([
            { "name": "read_file", "description": "Read a file" },
            { "name": "git_status" }
        ]);

        let tools = parse_tool_definitions(&json).unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1].name, "git_status");
        assert_eq!(tools[1].description, "");
    }

    #[test]
    fn test_parse_tools_wrapper_and_mcp_response() {
        let wrapped = json!({ "tools": [{ "name": "a" }] });
        let mcp = json!({ "jsonrpc": "2.0", "result": { "tools": [{ "name": "b" }] } });

        assert_eq!(parse_tool_definitions(&wrapped).unwrap()[0].name, "a");
        assert_eq!(parse_tool_definitions(&mcp).unwrap()[0].name, "b");
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        let result = parse_tool_definitions(&json!({ "jsonrpc": "2.0" }));
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_parse_skips_non_object_records() {
        let json = json!([42, { "name": "valid_tool" }, "oops"]);
        let tools = parse_tool_definitions(&json).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "valid_tool");
    }

    #[test]
    fn test_parameters_keep_declared_order() {
        let d = descriptor(json!({
            "name": "send_email",
            "inputSchema": {
                "properties": {
                    "to": { "type": "string", "description": "Recipient" },
                    "subject": { "type": "string" },
                    "body": { "description": "Body text" }
                },
                "required": ["to"]
            }
        }));

        let names: Vec<&str> = d.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["to", "subject", "body"]);
        assert!(d.parameters[0].required);
        assert!(!d.parameters[1].required);

        let tool = standardize(d, None);
        assert!(tool.enriched_text.contains(
            "Parameters:\n- to (string): Recipient\n- subject (string): No description\n- body (unknown): Body text"
        ));
    }

    #[test]
    fn test_compound_name_is_split() {
        let tool = standardize(
            descriptor(json!({ "name": "github__create_issue", "description": "Open an issue" })),
            None,
        );

        assert_eq!(tool.name, "create_issue");
        assert_eq!(tool.source_group, "Github");
        assert!(tool.enriched_text.starts_with("Tool: create_issue\nSource: Github tool source\n"));
    }

    #[test]
    fn test_compound_group_is_title_cased() {
        let tool = standardize(descriptor(json!({ "name": "my_code_server__run" })), None);
        assert_eq!(tool.source_group, "My Code Server");
        assert_eq!(tool.name, "run");
    }

    #[test]
    fn test_group_words_split_on_non_letters() {
        let tool = standardize(descriptor(json!({ "name": "web-tools__fetch" })), None);
        assert_eq!(tool.source_group, "Web-Tools");

        let tool = standardize(descriptor(json!({ "name": "s3bucket_API__list" })), None);
        assert_eq!(tool.source_group, "S3Bucket Api");
    }

    #[test]
    fn test_override_wins_over_prefix() {
        let tool = standardize(
            descriptor(json!({ "name": "github__create_issue", "server": "ignored" })),
            Some("Tracker"),
        );
        assert_eq!(tool.name, "create_issue");
        assert_eq!(tool.source_group, "Tracker");
    }

    #[test]
    fn test_server_field_used_without_prefix() {
        let tool = standardize(descriptor(json!({ "name": "ping", "server": "netops" })), None);
        assert_eq!(tool.source_group, "netops");

        let tool = standardize(descriptor(json!({ "name": "ping" })), None);
        assert_eq!(tool.source_group, UNKNOWN_SOURCE);
    }

    #[test]
    fn test_missing_name_uses_placeholder() {
        let tool = standardize(descriptor(json!({ "description": "Mystery" })), None);
        assert_eq!(tool.name, UNNAMED_TOOL);
        assert!(tool.enriched_text.starts_with("Tool: unnamed_tool\n"));
    }

    #[test]
    fn test_enriched_text_layout() {
        let tool = standardize(
            descriptor(json!({
                "name": "read_file",
                "description": "Read the contents of a file",
                "inputSchema": { "properties": { "path": { "type": "string", "description": "Path" } } }
            })),
            Some("Filesystem"),
        );

        let lines: Vec<&str> = tool.enriched_text.lines().collect();
        assert_eq!(lines[0], "Tool: read_file");
        assert_eq!(lines[1], "Source: Filesystem tool source");
        assert_eq!(lines[2], "Description: Read the contents of a file");
        assert_eq!(lines[3], "Parameters:");
        assert_eq!(lines[4], "- path (string): Path");
        assert_eq!(
            lines[5],
            "Keywords: directory, document, file, filesystem, folder, read"
        );
        assert_eq!(lines[6], "Use when: working with files or directories");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_empty_description_and_no_params() {
        let tool = standardize(descriptor(json!({ "name": "calculate" })), None);
        assert!(tool.enriched_text.contains("Description: No description provided"));
        assert!(!tool.enriched_text.contains("Parameters:"));
        assert!(tool.enriched_text.ends_with("Use when: general purpose tasks"));
    }

    #[test]
    fn test_standardize_is_idempotent() {
        let d = descriptor(json!({
            "name": "browser_navigate",
            "description": "Navigate to a URL in an automated browser",
            "inputSchema": { "properties": { "url": { "type": "string" } } }
        }));

        let first = standardize(d.clone(), None);
        let second = standardize(d, None);
        assert_eq!(first.enriched_text, second.enriched_text);
    }

    #[test]
    fn test_standardizer_keeps_duplicates_in_order() {
        let mut standardizer = ToolStandardizer::new();
        standardizer.add(descriptor(json!({ "name": "dup", "description": "first" })), None);
        standardizer.add(descriptor(json!({ "name": "dup", "description": "second" })), None);

        assert_eq!(standardizer.len(), 2);
        assert_eq!(standardizer.tools()[1].original.description, "second");
    }
}
