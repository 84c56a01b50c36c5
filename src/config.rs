use crate::inference::EmbedderSpec;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Directory holding one index file per collection.
    pub persist_dir: PathBuf,
    pub collection_name: String,
    /// Optional tool definitions file ingested at startup and used to populate the registry.
    pub tools_path: Option<PathBuf>,
    /// Rebuild the collection from `tools_path` even when an index already exists.
    pub rebuild_index: bool,
    /// Optional path to write the tool manifest after ingestion.
    pub manifest_path: Option<PathBuf>,
    /// Number of tools returned when a caller does not specify `k`.
    pub default_k: usize,
    /// Upper bound on a single index query (embedding + similarity scan).
    pub query_timeout_ms: u64,
    /// Concurrent retrievals allowed before callers receive 503.
    pub permits: usize,
    /// Tool names (resolved against the registry, in order) used when retrieval degrades.
    pub fallback_tools: Vec<String>,
    pub primary_embedder: EmbedderSpec,
    pub secondary_embedder: EmbedderSpec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8002,
            shutdown_timeout_secs: 30,
            persist_dir: PathBuf::from("./tool_index"),
            collection_name: "tool_collection".to_string(),
            tools_path: None,
            rebuild_index: false,
            manifest_path: None,
            default_k: 5,
            query_timeout_ms: 5_000,
            permits: 8,
            fallback_tools: Vec::new(),
            primary_embedder: EmbedderSpec::Onnx {
                name: "nomic-embed-text-v1.5".to_string(),
                model_path: PathBuf::from("./models/nomic-embed-text-v1.5/model.onnx"),
                tokenizer_path: PathBuf::from("./models/nomic-embed-text-v1.5/tokenizer.json"),
                max_length: 512,
                pool_size: 2,
            },
            secondary_embedder: EmbedderSpec::Hashing { dimension: 512 },
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to `Config::default()`.
    ///
    /// Embedders are described by `PRIMARY_*` and `SECONDARY_*` variables. `*_EMBEDDER`
    /// selects the backend (`onnx` or `hashing`); ONNX backends also read
    /// `*_MODEL_NAME`, `*_MODEL_PATH` and `*_TOKENIZER_PATH`.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let max_length: usize = env::var("MAX_SEQ_LENGTH")
            .unwrap_or_else(|_| "512".to_string())
            .parse()?;
        let pool_size: usize = env::var("POOL_SIZE")
            .unwrap_or_else(|_| "2".to_string())
            .parse()?;
        let hashing_dim: usize = env::var("HASHING_DIM")
            .unwrap_or_else(|_| "512".to_string())
            .parse()?;

        let primary_embedder = embedder_from_env(
            "PRIMARY",
            "onnx",
            "nomic-embed-text-v1.5",
            max_length,
            pool_size,
            hashing_dim,
        )?;
        let secondary_embedder = embedder_from_env(
            "SECONDARY",
            "hashing",
            "all-MiniLM-L6-v2",
            max_length,
            pool_size,
            hashing_dim,
        )?;

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8002".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            persist_dir: env::var("PERSIST_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.persist_dir),
            collection_name: env::var("COLLECTION_NAME").unwrap_or(defaults.collection_name),
            tools_path: env::var("TOOLS_PATH").ok().map(PathBuf::from),
            rebuild_index: parse_bool(&env::var("REBUILD_INDEX").unwrap_or_default()),
            manifest_path: env::var("MANIFEST_PATH").ok().map(PathBuf::from),
            default_k: env::var("DEFAULT_K")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            query_timeout_ms: env::var("QUERY_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            permits: env::var("PERMITS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()?,
            fallback_tools: env::var("FALLBACK_TOOLS")
                .map(|s| parse_list(&s))
                .unwrap_or_default(),
            primary_embedder,
            secondary_embedder,
        })
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

fn embedder_from_env(
    prefix: &str,
    default_kind: &str,
    default_name: &str,
    max_length: usize,
    pool_size: usize,
    hashing_dim: usize,
) -> anyhow::Result<EmbedderSpec> {
    let var = |suffix: &str| env::var(format!("{prefix}_{suffix}"));
    let kind = var("EMBEDDER")
        .unwrap_or_else(|_| default_kind.to_string())
        .to_lowercase();

    match kind.as_str() {
        "onnx" => {
            let name = var("MODEL_NAME").unwrap_or_else(|_| default_name.to_string());
            let model_dir = PathBuf::from("./models").join(&name);
            Ok(EmbedderSpec::Onnx {
                model_path: var("MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| model_dir.join("model.onnx")),
                tokenizer_path: var("TOKENIZER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| model_dir.join("tokenizer.json")),
                name,
                max_length,
                pool_size,
            })
        }
        "hashing" | "hash" => Ok(EmbedderSpec::Hashing {
            dimension: hashing_dim,
        }),
        other => anyhow::bail!("Unknown {prefix}_EMBEDDER '{other}' (expected onnx or hashing)"),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
