//! Built-in sample tools for smoke testing an index without a tools file.

use crate::ingestion::types::ToolDescriptor;
use serde_json::json;

/// The sample tool set, each paired with its source group "Sample Server <n>".
pub fn sample_tools() -> Vec<(ToolDescriptor, String)> {
    let records = [
        json!({
            "name": "read_file",
            "description": "Read the contents of a file from the filesystem",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to the file to read"},
                    "encoding": {"type": "string", "description": "File encoding, defaults to utf-8"}
                },
                "required": ["path"]
            }
        }),
        json!({
            "name": "git_status",
            "description": "Get the current status of a git repository",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "repository_path": {"type": "string", "description": "Path to git repository"}
                }
            }
        }),
        json!({
            "name": "web_search",
            "description": "Search the web for information using a search engine",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query terms"},
                    "max_results": {"type": "integer", "description": "Maximum number of results"}
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": "send_email",
            "description": "Send an email message to recipients",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient email address"},
                    "subject": {"type": "string", "description": "Email subject line"},
                    "body": {"type": "string", "description": "Email body content"}
                },
                "required": ["to", "subject", "body"]
            }
        }),
        json!({
            "name": "browser_navigate",
            "description": "Navigate to a URL in an automated browser",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL to navigate to"},
                    "wait_for_load": {"type": "boolean", "description": "Wait for page to fully load"}
                },
                "required": ["url"]
            }
        }),
    ];

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            (
                ToolDescriptor::from_json(record),
                format!("Sample Server {}", i + 1),
            )
        })
        .collect()
}
