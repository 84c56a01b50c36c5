//! Select, from a caller-supplied list of available tools, the ones relevant
//! to a query.

use crate::error::{AppError, Result};
use crate::retrieval::engine::{RetrievalEngine, RetrievalStatus};
use crate::retrieval::registry::{ToolHandle, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_SELECT_LIMIT: usize = 50;
pub const MAX_SIMILARITY_THRESHOLD: f32 = 2.0;

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectToolsRequest {
    pub query: String,
    /// Names the caller can currently invoke; results are restricted to these
    pub available_tools: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub similarity_threshold: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectToolsResponse {
    pub selected_tools: Vec<String>,
    /// Aligned with `selected_tools`
    pub scores: Vec<f32>,
    pub query: String,
    pub total_available: usize,
    pub total_selected: usize,
    pub status: RetrievalStatus,
}

impl SelectToolsRequest {
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Query cannot be empty".to_string(),
            ));
        }
        if !(1..=MAX_SELECT_LIMIT).contains(&self.limit) {
            return Err(AppError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_SELECT_LIMIT
            )));
        }
        if !(0.0..=MAX_SIMILARITY_THRESHOLD).contains(&self.similarity_threshold) {
            return Err(AppError::ValidationError(format!(
                "similarity_threshold must be between 0.0 and {}",
                MAX_SIMILARITY_THRESHOLD
            )));
        }
        Ok(())
    }

    /// Candidates fetched from the index before filtering by availability.
    pub fn fetch_count(&self) -> usize {
        (self.limit * 2).min(MAX_SELECT_LIMIT)
    }
}

impl RetrievalEngine {
    /// Rank the available tools against the query.
    ///
    /// The result is a subset of `available_tools` in descending score order,
    /// every score at least `similarity_threshold`, at most `limit` long.
    pub async fn select_tools<T: ToolHandle>(
        &self,
        registry: &ToolRegistry<T>,
        request: &SelectToolsRequest,
    ) -> Result<SelectToolsResponse> {
        request.validate()?;

        let scored = self
            .get_relevant_tools_with_scores(
                registry,
                &request.query,
                Some(request.fetch_count()),
                request.similarity_threshold,
            )
            .await?;

        let available: HashSet<&str> = request.available_tools.iter().map(String::as_str).collect();

        let (selected_tools, scores): (Vec<String>, Vec<f32>) = scored
            .tools
            .iter()
            .filter(|(tool, score)| {
                available.contains(tool.name()) && *score >= request.similarity_threshold
            })
            .take(request.limit)
            .map(|(tool, score)| (tool.name().to_string(), *score))
            .unzip();

        metrics::counter!("select_tools_requests_total", "status" => scored.status.label())
            .increment(1);

        tracing::info!(
            query = %request.query,
            limit = request.limit,
            total_available = request.available_tools.len(),
            total_selected = selected_tools.len(),
            status = scored.status.label(),
            "Tools selected"
        );

        Ok(SelectToolsResponse {
            total_available: request.available_tools.len(),
            total_selected: selected_tools.len(),
            selected_tools,
            scores,
            query: request.query.clone(),
            status: scored.status,
        })
    }
}
