//! Toolsift - semantic tool retrieval
//!
//! Indexes tool descriptors as enriched text embeddings and, per query,
//! returns the few tools an agent actually needs. The library exposes the
//! ingestion pipeline, vector index and retrieval engine; the binary wraps
//! them in an HTTP service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod ingestion;
pub mod persistence;
pub mod retrieval;
pub mod state;

// Re-export key types for convenience
pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::{
    explain_handler, health_handler, ready_handler, select_tools_handler, stats_handler,
};
pub use inference::{init_provider, EmbedderSpec, EmbeddingProvider, HashingEmbedder, OnnxEmbedder};
pub use ingestion::{IngestionPipeline, StandardizedTool, ToolDescriptor, ToolStandardizer};
pub use persistence::VectorIndex;
pub use retrieval::{
    RegisteredTool, RetrievalEngine, RetrievalSettings, RetrievalStatus, ToolHandle, ToolRegistry,
};
pub use state::AppState;
