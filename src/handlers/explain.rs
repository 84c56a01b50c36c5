//! Retrieval explanation handler.
//!
//! Shows which tools a query retrieves, with their similarity scores and a
//! short description, so operators can see why an agent was offered a tool.

use crate::error::{AppError, Result};
use crate::retrieval::RetrievalExplanation;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    /// The natural language query to explain
    pub query: String,
    /// Number of tools to retrieve (default: the service's DEFAULT_K)
    #[serde(default)]
    pub k: Option<usize>,
}

/// POST /explain - Scored retrieval results for a query.
///
/// Read-only: the registry and index are never modified.
pub async fn explain_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<RetrievalExplanation>> {
    if request.query.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Query cannot be empty".to_string(),
        ));
    }

    let _permit = tokio::time::timeout(Duration::from_secs(5), state.semaphore.acquire())
        .await
        .map_err(|_| {
            AppError::ResourceError("Service temporarily overloaded, please retry".to_string())
        })?
        .map_err(|_| AppError::ResourceError("Semaphore closed".to_string()))?;

    let registry = state.registry();
    let explanation = state
        .engine
        .explain_retrieval(&*registry, &request.query, request.k)
        .await?;

    tracing::info!(
        query = %request.query,
        retrieved = explanation.retrieved_tools.len(),
        status = explanation.status.label(),
        "Retrieval explained"
    );

    Ok(Json(explanation))
}
