use crate::error::{AppError, Result};
use std::path::Path;
use tokenizers::Tokenizer;

/// Token ids for a single text, truncated to the configured maximum length.
pub struct EncodedText {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

pub struct TokenizerWrapper {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TokenizerWrapper {
    pub fn load(tokenizer_path: &Path, max_length: usize) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| AppError::TokenizationError(e.to_string()))?;

        tracing::info!(
            path = %tokenizer_path.display(),
            max_length,
            "Tokenizer loaded successfully"
        );

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    /// Tokenize one text for embedding.
    ///
    /// Texts are encoded one at a time so that no padding is shared between
    /// inputs; a text embeds identically alone or as part of a batch.
    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| AppError::TokenizationError(e.to_string()))?;

        let len = encoding.get_ids().len().min(self.max_length);
        if len == 0 {
            return Err(AppError::TokenizationError(
                "Tokenizer produced no tokens".to_string(),
            ));
        }

        let widen = |values: &[u32]| values[..len].iter().map(|&v| v as i64).collect::<Vec<_>>();

        Ok(EncodedText {
            input_ids: widen(encoding.get_ids()),
            attention_mask: widen(encoding.get_attention_mask()),
            token_type_ids: widen(encoding.get_type_ids()),
        })
    }
}
