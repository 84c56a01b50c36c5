pub mod bi_encoder;
pub mod hashing;
pub mod provider;
pub mod tokenize;

pub use bi_encoder::OnnxEmbedder;
pub use hashing::HashingEmbedder;
pub use provider::{init_provider, load_provider, EmbedderSpec, EmbeddingProvider, SharedProvider};
pub use tokenize::TokenizerWrapper;
