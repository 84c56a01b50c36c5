//! Integration tests for the Toolsift HTTP service.
//!
//! These tests drive the router with `oneshot` against an index built with
//! the hashing embedder in a temp directory, so no model files are needed.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use toolsift::{
    handlers::{explain_handler, health_handler, ready_handler, select_tools_handler, stats_handler},
    AppState, Config, HashingEmbedder, IngestionPipeline, RegisteredTool, RetrievalEngine,
    RetrievalSettings, ToolRegistry, VectorIndex,
};
use tower::ServiceExt;

/// Helper to create a test router with every service endpoint.
fn create_test_app(state: Arc<AppState>) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/select-tools", post(select_tools_handler))
        .route("/explain", post(explain_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// Sample tools indexed in a temp directory, registered, with `send_email`
/// and `web_search` as fallback tools.
fn sample_state(dir: &TempDir) -> Arc<AppState> {
    let provider = Arc::new(HashingEmbedder::new(512).unwrap());
    let mut pipeline = IngestionPipeline::new(dir.path(), provider);
    pipeline.load_sample_tools();
    let index = pipeline.build_index("tool_collection").unwrap();

    let mut registry = ToolRegistry::new();
    registry.register_tools(pipeline.tools().iter().map(|t| Arc::new(RegisteredTool::from(t))));
    let fallback: Vec<_> = ["send_email", "web_search"]
        .iter()
        .filter_map(|n| registry.get(n).cloned())
        .collect();
    registry.set_fallback_tools(fallback);

    let state = AppState::from_parts(
        Config::default(),
        RetrievalEngine::new(index, RetrievalSettings::default()),
        registry,
    );
    state.mark_ready();
    Arc::new(state)
}

/// State whose collection was never built.
fn unbuilt_state(dir: &TempDir) -> Arc<AppState> {
    let provider = Arc::new(HashingEmbedder::new(512).unwrap());
    let index = VectorIndex::new(dir.path(), "tool_collection", provider).unwrap();
    Arc::new(AppState::from_parts(
        Config::default(),
        RetrievalEngine::new(Arc::new(index), RetrievalSettings::default()),
        ToolRegistry::new(),
    ))
}

/// Helper to make a JSON request to the router.
async fn json_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = match method {
        "GET" => Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
        "POST" => Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.unwrap_or(json!({})).to_string()))
            .unwrap(),
        _ => panic!("Unsupported method"),
    };

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

// ============================================================================
// Health Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_200() {
    use axum::routing::get;

    let app = Router::new().route("/health", get(health_handler));
    let (status, body) = json_request(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_endpoint_reflects_state() {
    let dir = TempDir::new().unwrap();

    let (status, body) = json_request(create_test_app(unbuilt_state(&dir)), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let (status, body) = json_request(create_test_app(sample_state(&dir)), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_stats_reports_index_and_registry() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));

    let (status, body) = json_request(app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collection"], "tool_collection");
    assert_eq!(body["embedding_model"], "feature-hash-v1-512");
    assert_eq!(body["registered_tools"], 5);
    assert_eq!(body["total_documents"], 5);
    assert_eq!(body["fallback_tools"], json!(["send_email", "web_search"]));
    assert!(body["index_error"].is_null());
}

// ============================================================================
// Select Tools Validation Tests
// ============================================================================

#[tokio::test]
async fn test_select_empty_query_returns_400() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));

    let (status, body) = json_request(
        app,
        "POST",
        "/select-tools",
        Some(json!({"query": "", "available_tools": ["read_file"]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_select_limit_out_of_range_returns_400() {
    let dir = TempDir::new().unwrap();
    let state = sample_state(&dir);

    for limit in [0, 51] {
        let (status, _) = json_request(
            create_test_app(Arc::clone(&state)),
            "POST",
            "/select-tools",
            Some(json!({"query": "read a file", "available_tools": ["read_file"], "limit": limit})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit {limit}");
    }
}

#[tokio::test]
async fn test_select_threshold_out_of_range_returns_400() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));

    let (status, _) = json_request(
        app,
        "POST",
        "/select-tools",
        Some(json!({
            "query": "read a file",
            "available_tools": ["read_file"],
            "similarity_threshold": 2.5
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Select Tools Behaviour Tests
// ============================================================================

#[tokio::test]
async fn test_select_returns_subset_of_available_sorted() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));
    let available = ["read_file", "git_status", "browser_navigate"];

    let (status, body) = json_request(
        app,
        "POST",
        "/select-tools",
        Some(json!({"query": "check git status", "available_tools": available, "limit": 5})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let selected: Vec<&str> = body["selected_tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    let scores: Vec<f64> = body["scores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();

    assert!(selected.iter().all(|name| available.contains(name)));
    assert_eq!(selected[0], "git_status");
    assert_eq!(selected.len(), scores.len());
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(body["total_available"], 3);
    assert_eq!(body["total_selected"], selected.len());
    assert_eq!(body["query"], "check git status");
}

#[tokio::test]
async fn test_select_applies_threshold_and_limit() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));

    let (status, body) = json_request(
        app,
        "POST",
        "/select-tools",
        Some(json!({
            "query": "send an email message to recipients",
            "available_tools": ["read_file", "git_status", "web_search", "send_email", "browser_navigate"],
            "limit": 1,
            "similarity_threshold": 0.1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected_tools"], json!(["send_email"]));
    assert!(body["scores"][0].as_f64().unwrap() >= 0.1);
}

#[tokio::test]
async fn test_select_with_missing_index_degrades() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(unbuilt_state(&dir));

    let (status, body) = json_request(
        app,
        "POST",
        "/select-tools",
        Some(json!({"query": "check git status", "available_tools": ["git_status"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected_tools"], json!([]));
    assert_eq!(body["status"]["kind"], "degraded");
    assert_eq!(body["status"]["error"], "missing_index");
}

// ============================================================================
// Explain Tests
// ============================================================================

#[tokio::test]
async fn test_explain_returns_scored_tools() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));

    let (status, body) = json_request(
        app,
        "POST",
        "/explain",
        Some(json!({"query": "read the contents of a file", "k": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["retrieval_strategy"], "semantic_similarity");
    assert_eq!(body["embedding_model"], "feature-hash-v1-512");
    assert_eq!(body["retrieved_tools"].as_array().unwrap().len(), 2);
    assert_eq!(body["retrieved_tools"][0]["name"], "read_file");
    assert_eq!(
        body["retrieved_tools"][0]["description_preview"],
        "Read the contents of a file from the filesystem"
    );
}

#[tokio::test]
async fn test_explain_zero_k_returns_400() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(sample_state(&dir));

    let (status, _) = json_request(app, "POST", "/explain", Some(json!({"query": "q", "k": 0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Full startup (requires model files)
// ============================================================================

#[tokio::test]
#[ignore = "Requires model files - run with --ignored after exporting model"]
async fn test_ready_endpoint_returns_200_after_warmup() {
    let config = Config::from_env().expect("Failed to load config");
    let state = Arc::new(AppState::new(config).expect("Failed to create state"));
    let app = create_test_app(state);

    let (status, body) = json_request(app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}
