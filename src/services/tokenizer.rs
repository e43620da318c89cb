//! Model-specific text <-> token id encoding backed by `tiktoken-rs`.
//!
//! Ordinary encoding is used so that strings such as `<|endoftext|>` inside a
//! book are tokenized as plain text and survive a round trip.
//!
//! Windows cut from a token sequence may split the byte-level tokens of one
//! multi-byte character. [`Encoder::decode`] drops such a dangling fragment at
//! either edge of the window instead of failing; decoding a complete sequence
//! is lossless.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::services::llm::LlmError;

pub type TokenId = tiktoken_rs::Rank;

// A UTF-8 character spans at most 4 bytes, so at most 3 tokens of a split one
// can sit on either side of a window boundary.
const MAX_FRAGMENT_TOKENS: usize = 3;

#[derive(Clone)]
pub struct Encoder {
    model: String,
    bpe: Arc<CoreBPE>,
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder").field("model", &self.model).finish()
    }
}

impl Encoder {
    pub fn for_model(model: &str) -> Result<Self, LlmError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| LlmError::Tokenizer(model.to_string(), e.to_string()))?;
        Ok(Encoder {
            model: model.to_string(),
            bpe: Arc::new(bpe),
        })
    }

    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        if text.is_empty() {
            return Vec::new();
        }
        self.bpe.encode_ordinary(text)
    }

    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    pub fn decode(&self, tokens: &[TokenId]) -> String {
        if let Ok(text) = self.bpe.decode(tokens.to_vec()) {
            return text;
        }

        // Trim split characters off the window edges, smallest cut first
        let limit = MAX_FRAGMENT_TOKENS.min(tokens.len());
        for cut in 1..=(2 * limit) {
            for front in 0..=cut.min(limit) {
                let back = cut - front;
                if back > limit || front + back > tokens.len() {
                    continue;
                }
                let inner = &tokens[front..tokens.len() - back];
                if let Ok(text) = self.bpe.decode(inner.to_vec()) {
                    return text;
                }
            }
        }

        tracing::warn!(model = %self.model, tokens = tokens.len(), "window did not decode to valid UTF-8");
        String::new()
    }
}
