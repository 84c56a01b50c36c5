//! Ingestion module for processing external tool definitions.
//!
//! This module turns MCP-style tool definitions into enriched, standardized
//! records and builds them into a persisted vector index.

pub mod keywords;
pub mod manifest;
pub mod pipeline;
pub mod samples;
pub mod standardizer;
pub mod types;

pub use manifest::{preview, ToolManifest};
pub use pipeline::{IngestionPipeline, PipelineStats};
pub use samples::sample_tools;
pub use standardizer::{parse_tool_definitions, standardize, ToolStandardizer};
pub use types::{ParameterSpec, StandardizedTool, ToolDescriptor};
