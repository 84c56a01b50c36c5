//! Fixed vocabularies used to enrich tool descriptions for retrieval.

use std::collections::BTreeSet;

/// Action verbs looked for in descriptions.
const ACTION_VERBS: &[&str] = &[
    "create", "read", "write", "update", "delete", "get", "set", "list", "search", "find",
    "execute", "run", "send", "receive", "fetch", "upload", "download", "generate", "analyze",
    "process", "transform",
];

/// Domain anchors and the synonyms each one contributes when present.
const DOMAIN_SYNONYMS: &[(&str, &[&str])] = &[
    ("file", &["filesystem", "directory", "folder", "document"]),
    ("git", &["version control", "repository", "commit", "branch"]),
    ("database", &["data", "query", "record", "table"]),
    ("api", &["web", "http", "request", "endpoint"]),
    ("browser", &["web", "automation", "selenium", "playwright"]),
    ("email", &["message", "communication", "send"]),
    ("auth", &["authentication", "login", "security", "token"]),
];

/// Name patterns mapped to "use when" clauses, checked in order.
const USE_CASES: &[(&[&str], &str)] = &[
    (
        &["file", "read", "write", "directory"],
        "working with files or directories",
    ),
    (
        &["git", "commit", "branch", "repo"],
        "managing version control or repositories",
    ),
    (
        &["web", "http", "api", "request"],
        "making web requests or API calls",
    ),
    (
        &["browser", "click", "navigate"],
        "automating browser interactions",
    ),
    (
        &["search", "query", "find", "filter"],
        "searching or querying data",
    ),
    (
        &["send", "email", "message", "notify"],
        "sending messages or notifications",
    ),
];

pub const DEFAULT_USE_CASE: &str = "general purpose tasks";

/// Extract retrieval keywords from a tool name and description.
///
/// Matching against the description is by substring, so "set" also matches
/// "settings". The result is sorted so enrichment stays deterministic.
pub fn extract_keywords(name: &str, description: &str) -> BTreeSet<String> {
    let name_lower = name.to_lowercase();
    let desc_lower = description.to_lowercase();

    let mut keywords: BTreeSet<String> = name_lower
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect();

    keywords.extend(
        ACTION_VERBS
            .iter()
            .filter(|verb| desc_lower.contains(*verb))
            .map(|verb| verb.to_string()),
    );

    for (anchor, synonyms) in DOMAIN_SYNONYMS {
        if desc_lower.contains(anchor) || name_lower.contains(anchor) {
            keywords.extend(synonyms.iter().map(|s| s.to_string()));
        }
    }

    keywords
}

/// Infer "use when" clauses from the tool name.
pub fn infer_use_cases(name: &str) -> String {
    let name_lower = name.to_lowercase();

    let clauses: Vec<&str> = USE_CASES
        .iter()
        .filter(|(patterns, _)| patterns.iter().any(|p| name_lower.contains(p)))
        .map(|(_, clause)| *clause)
        .collect();

    if clauses.is_empty() {
        DEFAULT_USE_CASE.to_string()
    } else {
        clauses.join("; ")
    }
}
