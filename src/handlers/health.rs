use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub collection: String,
    pub persist_directory: PathBuf,
    pub embedding_model: String,
    pub registered_tools: usize,
    pub fallback_tools: Vec<String>,
    /// Entries in the index, if it could be read
    pub total_documents: Option<usize>,
    /// Why the index could not be read
    pub index_error: Option<String>,
}

/// GET /health - Liveness probe
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready - Readiness probe (checks provider is loaded and warmed up)
pub async fn ready_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                version: env!("CARGO_PKG_VERSION"),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
                version: env!("CARGO_PKG_VERSION"),
            }),
        )
    }
}

/// GET /stats - Index and registry summary
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let index = state.engine.index();
    let registry = state.registry();

    let (total_documents, index_error) = match index.info() {
        Ok(info) => (Some(info.total_documents), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Json(StatsResponse {
        collection: index.collection_name().to_string(),
        persist_directory: index.persist_dir().to_path_buf(),
        embedding_model: state.engine.model_id().to_string(),
        registered_tools: registry.len(),
        fallback_tools: registry
            .fallback()
            .iter()
            .map(|t| t.name.clone())
            .collect(),
        total_documents,
        index_error,
    })
}
