use crate::config::Config;
use crate::error::Result;
use crate::inference::init_provider;
use crate::ingestion::IngestionPipeline;
use crate::persistence::VectorIndex;
use crate::retrieval::{RegisteredTool, RetrievalEngine, RetrievalSettings, ToolRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Application state shared across all request handlers.
pub struct AppState {
    pub engine: RetrievalEngine,
    pub registry: Arc<ToolRegistry<RegisteredTool>>,
    pub semaphore: Arc<Semaphore>,
    /// Flag indicating the service is ready (provider loaded and warmed up)
    pub ready: AtomicBool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// # Startup
    /// 1. Load the embedding provider (primary, else secondary)
    /// 2. If `TOOLS_PATH` is set, ingest it when the collection is missing or
    ///    `REBUILD_INDEX` is set, and export the manifest if configured
    /// 3. Register tools from the tools file, or from the index entries
    /// 4. Resolve `FALLBACK_TOOLS` against the registry
    /// 5. Warm up the provider and mark ready
    pub fn new(config: Config) -> Result<Self> {
        let provider = init_provider(&config.primary_embedder, &config.secondary_embedder)?;
        let index = Arc::new(VectorIndex::new(
            &config.persist_dir,
            &config.collection_name,
            Arc::clone(&provider),
        )?);

        let tools: Vec<RegisteredTool> = match &config.tools_path {
            Some(tools_path) => {
                let mut pipeline = IngestionPipeline::new(&config.persist_dir, provider);
                pipeline.load_file(tools_path)?;

                if config.rebuild_index || !index.exists() {
                    pipeline.build_into(&index)?;
                } else {
                    tracing::info!(
                        collection = %config.collection_name,
                        "Using existing index (set REBUILD_INDEX=true to rebuild)"
                    );
                }

                if let Some(manifest_path) = &config.manifest_path {
                    pipeline.export_manifest(manifest_path, &config.collection_name)?;
                }

                pipeline.tools().iter().map(RegisteredTool::from).collect()
            }
            None => match index.entries() {
                Ok(entries) => entries.iter().map(RegisteredTool::from).collect(),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "No tools registered; queries will return fallback tools only"
                    );
                    Vec::new()
                }
            },
        };

        let mut registry = ToolRegistry::new();
        registry.register_tools(tools.into_iter().map(Arc::new));

        let fallback: Vec<Arc<RegisteredTool>> = config
            .fallback_tools
            .iter()
            .filter_map(|name| {
                let tool = registry.get(name).cloned();
                if tool.is_none() {
                    tracing::warn!(tool = %name, "Fallback tool is not registered, ignoring");
                }
                tool
            })
            .collect();
        registry.set_fallback_tools(fallback);

        tracing::info!(
            registered = registry.len(),
            fallback = registry.fallback().len(),
            "Tool registry initialized"
        );

        let engine = RetrievalEngine::new(
            index,
            RetrievalSettings {
                default_k: config.default_k,
                query_timeout: config.query_timeout(),
            },
        );

        let state = Self::from_parts(config, engine, registry);

        // Warmup the provider with a dummy embedding
        state.warmup()?;

        // Mark as ready after successful warmup
        state.ready.store(true, Ordering::SeqCst);

        Ok(state)
    }

    /// Assemble state from prebuilt parts. Not ready until `mark_ready`.
    pub fn from_parts(
        config: Config,
        engine: RetrievalEngine,
        registry: ToolRegistry<RegisteredTool>,
    ) -> Self {
        Self {
            engine,
            registry: Arc::new(registry),
            semaphore: Arc::new(Semaphore::new(config.permits.max(1))),
            ready: AtomicBool::new(false),
            config: Arc::new(config),
        }
    }

    /// Run a warmup embedding so the first real query doesn't pay cold-start latency.
    fn warmup(&self) -> Result<()> {
        tracing::info!("Running provider warmup...");
        let _ = self.engine.index().provider().embed("warmup query")?;
        tracing::info!("Provider warmup completed successfully");
        Ok(())
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Arc<ToolRegistry<RegisteredTool>> {
        Arc::clone(&self.registry)
    }
}
