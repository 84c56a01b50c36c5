use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No tools loaded; load tool definitions before building an index")]
    NoToolsLoaded,

    #[error("No index for collection '{collection}' in {}", persist_dir.display())]
    MissingIndex {
        persist_dir: PathBuf,
        collection: String,
    },

    #[error("Index is corrupt or unreadable: {0}")]
    IndexCorrupt(String),

    #[error("No embedding provider could be initialized: {0}")]
    EmbeddingUnavailable(String),

    #[error("Index was built with '{index_model}' ({index_dim} dims) but the query provider is '{query_model}' ({query_dim} dims)")]
    ProviderMismatch {
        index_model: String,
        index_dim: usize,
        query_model: String,
        query_dim: usize,
    },

    #[error("Model inference failed: {0}")]
    ModelError(String),

    #[error("Tokenization failed: {0}")]
    TokenizationError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Service temporarily unavailable: {0}")]
    ResourceError(String),

    #[error("Index query exceeded {0} ms")]
    QueryTimeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether the retrieval engine may answer with fallback tools instead of
    /// propagating this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::MissingIndex { .. }
            | AppError::IndexCorrupt(_)
            | AppError::ProviderMismatch { .. }
            | AppError::ModelError(_)
            | AppError::TokenizationError(_)
            | AppError::ResourceError(_)
            | AppError::QueryTimeout(_) => true,
            AppError::NoToolsLoaded
            | AppError::EmbeddingUnavailable(_)
            | AppError::ValidationError(_)
            | AppError::Io(_) => false,
        }
    }

    /// Short machine-readable name for status reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NoToolsLoaded => "no_tools_loaded",
            AppError::MissingIndex { .. } => "missing_index",
            AppError::IndexCorrupt(_) => "index_corrupt",
            AppError::EmbeddingUnavailable(_) => "embedding_unavailable",
            AppError::ProviderMismatch { .. } => "provider_mismatch",
            AppError::ModelError(_) => "model_error",
            AppError::TokenizationError(_) => "tokenization_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::ResourceError(_) => "resource_error",
            AppError::QueryTimeout(_) => "query_timeout",
            AppError::Io(_) => "io_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ValidationError(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                StatusCode::BAD_REQUEST
            }
            AppError::NoToolsLoaded => {
                tracing::warn!("Index build requested with no tools loaded");
                StatusCode::BAD_REQUEST
            }
            AppError::MissingIndex { .. } => {
                tracing::warn!(error = %self, "Index missing");
                StatusCode::NOT_FOUND
            }
            AppError::ResourceError(msg) => {
                tracing::warn!(error = %msg, "Resource error");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::QueryTimeout(ms) => {
                tracing::warn!(timeout_ms = ms, "Query timeout");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::EmbeddingUnavailable(_) => {
                tracing::error!(error = %self, "Embedding provider unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::IndexCorrupt(_)
            | AppError::ProviderMismatch { .. }
            | AppError::ModelError(_)
            | AppError::TokenizationError(_)
            | AppError::Io(_) => {
                tracing::error!(error = %self, kind = self.kind(), "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::ModelError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
