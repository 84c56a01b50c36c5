use crate::error::{AppError, Result};
use crate::retrieval::{SelectToolsRequest, SelectToolsResponse};
use crate::state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Duration;

/// POST /select-tools - Pick the available tools relevant to a query.
///
/// # Flow
/// 1. Validate input
/// 2. Acquire semaphore permit (503 if the service is saturated)
/// 3. Snapshot the registry
/// 4. Query the index (bounded by the query timeout) and filter to
///    `available_tools`
pub async fn select_tools_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectToolsRequest>,
) -> Result<Json<SelectToolsResponse>> {
    let start_time = std::time::Instant::now();

    request.validate()?;

    // Acquire semaphore with timeout (503 if service overloaded)
    let _permit = tokio::time::timeout(Duration::from_secs(5), state.semaphore.acquire())
        .await
        .map_err(|_| {
            AppError::ResourceError("Service temporarily overloaded, please retry".to_string())
        })?
        .map_err(|_| AppError::ResourceError("Semaphore closed".to_string()))?;

    let registry = state.registry();
    let response = state.engine.select_tools(&*registry, &request).await?;

    tracing::debug!(
        total_ms = start_time.elapsed().as_millis() as u64,
        selected = response.total_selected,
        "Select tools request completed"
    );

    Ok(Json(response))
}
