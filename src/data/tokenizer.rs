//! Tokenizer wrapper for causal LM fine-tuning
//!
//! Wraps a HuggingFace `tokenizer.json` file and adds the fixed-length
//! encoding the dataset needs (truncate, then pad with the pad token).

use crate::{Error, Result};
use std::path::Path;
use tokenizers::Tokenizer;

/// Tokenizer wrapper exposing fixed-length and unpadded encoding
pub struct LmTokenizer {
    tokenizer: Tokenizer,
    pad_token_id: u32,
    vocab_size: usize,
}

impl LmTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenizer(format!("cannot load tokenizer from '{}': {e}", path.display()))
        })?;

        let vocab_size = tokenizer.get_vocab_size(true);

        // Common pad-token spellings, with id 0 as the fallback
        let pad_token_id = tokenizer
            .token_to_id("[PAD]")
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .unwrap_or(0);

        Ok(Self {
            tokenizer,
            pad_token_id,
            vocab_size,
        })
    }

    /// Encode text without padding
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Tokenizer(format!("encoding failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Encode text to exactly `max_length` tokens
    ///
    /// Longer sequences are truncated; shorter ones are padded with the pad
    /// token. Returns `(input_ids, attention_mask)` where the mask is 1 for
    /// real tokens and 0 for padding.
    pub fn encode_fixed(&self, text: &str, max_length: usize) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut ids = self.encode(text)?;
        ids.truncate(max_length);

        let mut mask = vec![1u32; ids.len()];
        ids.resize(max_length, self.pad_token_id);
        mask.resize(max_length, 0);

        Ok((ids, mask))
    }

    /// Decode token ids back to text, skipping special tokens
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| Error::Tokenizer(format!("decoding failed: {e}")))
    }

    /// Pad token id
    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    /// Vocabulary size including special tokens
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}
