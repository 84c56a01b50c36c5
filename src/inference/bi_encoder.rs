//! ONNX bi-encoder embedding provider.
//!
//! Encodes text with a sentence-embedding model (nomic-embed-text, MiniLM,
//! BGE and similar exports) using mean pooling over the attention mask and
//! L2 normalisation, so cosine similarity reduces to a dot product.

use crate::error::{AppError, Result};
use crate::inference::provider::EmbeddingProvider;
use crate::inference::tokenize::TokenizerWrapper;
use crossbeam::queue::ArrayQueue;
use crossbeam::utils::Backoff;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::cell::UnsafeCell;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedding model backed by a pool of ONNX Runtime sessions.
///
/// # Session Pool
/// `Session::run` requires `&mut self`. Rather than serializing every caller
/// behind a Mutex, the embedder owns N sessions and hands out exclusive
/// indices through a lock-free queue. Batch embedding fans out across the
/// pool; each text is still encoded on its own, so batch results match
/// single-text results exactly.
///
/// # Safety
/// Each session index is held by at most one thread between
/// `acquire_session` and `release_session`; the ArrayQueue guarantees this.
pub struct OnnxEmbedder {
    model_id: String,
    sessions: Vec<UnsafeCell<Session>>,
    available: ArrayQueue<usize>,
    tokenizer: TokenizerWrapper,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Load model and tokenizer, build the session pool and probe the
    /// embedding dimension with a warmup inference.
    ///
    /// # Arguments
    /// * `model_id` - Identity recorded in every index built with this model
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer JSON file
    /// * `max_length` - Maximum sequence length
    /// * `pool_size` - Number of sessions to create
    pub fn load(
        model_id: &str,
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
    ) -> Result<Self> {
        for path in [model_path, tokenizer_path] {
            if !path.exists() {
                return Err(AppError::ModelError(format!(
                    "Model file not found: {}",
                    path.display()
                )));
            }
        }

        let tokenizer = TokenizerWrapper::load(tokenizer_path, max_length)?;

        // Read model file once
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| AppError::ModelError(format!("Failed to read model file: {}", e)))?;

        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        let available = ArrayQueue::new(pool_size);

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| AppError::ModelError(e.to_string()))?;

            sessions.push(UnsafeCell::new(session));
            available
                .push(i)
                .map_err(|_| AppError::ModelError("Failed to initialize session pool".into()))?;
        }

        let mut embedder = Self {
            model_id: model_id.to_string(),
            sessions,
            available,
            tokenizer,
            dimension: 0,
        };

        // The hidden size is only known once the graph has run.
        let probe = embedder.embed("warmup")?;
        embedder.dimension = probe.len();

        tracing::info!(
            model_id,
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            pool_size,
            dimension = embedder.dimension,
            "ONNX embedder loaded"
        );

        Ok(embedder)
    }

    /// Take a session index, waiting for one to be released if the pool is drained.
    fn acquire_session(&self) -> usize {
        let backoff = Backoff::new();
        loop {
            if let Some(index) = self.available.pop() {
                return index;
            }
            backoff.snooze();
        }
    }

    fn release_session(&self, index: usize) {
        // Only indices taken from the queue come back, so this cannot overflow
        let _ = self.available.push(index);
    }

    /// Encode one text on a session the caller holds.
    fn encode_on_session(&self, session_idx: usize, text: &str) -> Result<Vec<f32>> {
        let encoded = self.tokenizer.encode(text)?;
        let seq_len = encoded.len();
        let attention_mask = encoded.attention_mask.clone();

        let shape = [1usize, seq_len];
        let input_ids_tensor = Tensor::from_array((shape, encoded.input_ids))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, encoded.attention_mask))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, encoded.token_type_ids))
            .map_err(|e| AppError::ModelError(e.to_string()))?;

        // SAFETY: the caller acquired session_idx from the ArrayQueue and has
        // not released it, so no other thread can reach this session.
        let session = unsafe { &mut *self.sessions[session_idx].get() };

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::ModelError(format!("Embedding inference failed: {}", e)))?;

        // last_hidden_state: (1, seq_len, hidden_size)
        let hidden_state = outputs
            .get("last_hidden_state")
            .ok_or_else(|| AppError::ModelError("No 'last_hidden_state' output found".to_string()))?;

        let tensor = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::ModelError(e.to_string()))?;

        let (shape_info, data) = tensor;
        let hidden_size = shape_info[2] as usize;

        let mut embedding = vec![0.0f32; hidden_size];
        let mut count = 0.0f32;

        for (j, &mask) in attention_mask.iter().enumerate() {
            if mask == 1 {
                let base_idx = j * hidden_size;
                for (k, val) in embedding.iter_mut().enumerate() {
                    *val += data[base_idx + k];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            for val in embedding.iter_mut() {
                *val /= count;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in embedding.iter_mut() {
                *val /= norm;
            }
        }

        Ok(embedding)
    }

    /// Worker loop for batch embedding: hold one session and pull texts until
    /// the shared cursor runs past the end.
    fn drain_batch(&self, texts: &[String], cursor: &AtomicUsize) -> Result<Vec<(usize, Vec<f32>)>> {
        let session_idx = self.acquire_session();
        let mut embedded = Vec::new();
        let mut failure = None;

        loop {
            let i = cursor.fetch_add(1, Ordering::Relaxed);
            if i >= texts.len() {
                break;
            }
            match self.encode_on_session(session_idx, &texts[i]) {
                Ok(vector) => embedded.push((i, vector)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.release_session(session_idx);

        match failure {
            Some(e) => Err(e),
            None => Ok(embedded),
        }
    }
}

impl EmbeddingProvider for OnnxEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let session_idx = self.acquire_session();
        let result = self.encode_on_session(session_idx, text);
        self.release_session(session_idx);
        result
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() <= 1 {
            return texts.iter().map(|t| self.embed(t)).collect();
        }

        let cursor = AtomicUsize::new(0);
        let workers = self.sessions.len().min(texts.len());

        let worker_results = crossbeam::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| scope.spawn(|_| self.drain_batch(texts, &cursor)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| AppError::ModelError("Embedding worker panicked".into()))
                })
                .collect::<Vec<_>>()
        })
        .map_err(|_| AppError::ModelError("Embedding worker panicked".into()))?;

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for worker in worker_results {
            for (i, vector) in worker?? {
                slots[i] = Some(vector);
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| AppError::ModelError(format!("No embedding produced for text {}", i)))
            })
            .collect()
    }
}

// SAFETY: OnnxEmbedder is Send + Sync because:
// - ArrayQueue is lock-free and thread-safe (crossbeam guarantee)
// - ArrayQueue::pop() returns each index to at most one caller at a time
// - Between pop and push, only one thread can access each UnsafeCell<Session>
// - The tokenizer is only read
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}
