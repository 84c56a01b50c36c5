//! Retrieval: map a natural-language query to the relevant registered tools.

pub mod engine;
pub mod registry;
pub mod select;

pub use engine::{
    ExplainedTool, Retrieval, RetrievalEngine, RetrievalExplanation, RetrievalSettings,
    RetrievalStatus, ScoredRetrieval, FALLBACK_SCORE,
};
pub use registry::{RegisteredTool, ToolHandle, ToolRegistry};
pub use select::{SelectToolsRequest, SelectToolsResponse, MAX_SELECT_LIMIT};
