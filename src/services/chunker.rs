use crate::services::tokenizer::{Encoder, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid window: chunk size {chunk_size} must be positive and larger than overlap {overlap}")]
    InvalidWindow { chunk_size: usize, overlap: usize },
}

/// Splits `tokens` into windows of at most `chunk_size` tokens where
/// consecutive windows share `overlap` tokens.
pub fn chunk_tokens<T>(
    tokens: &[T],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<&[T]>, ChunkError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ChunkError::InvalidWindow {
            chunk_size,
            overlap,
        });
    }

    let step = chunk_size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + chunk_size).min(tokens.len());
        windows.push(&tokens[start..end]);
        if start + chunk_size >= tokens.len() {
            break;
        }
        start += step;
    }

    Ok(windows)
}

/// Encodes `text`, windows the tokens and decodes every window on its own.
/// Overlapping regions show up verbatim at the end of one chunk and the start
/// of the next.
pub fn chunk_text(
    encoder: &Encoder,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkError> {
    let tokens: Vec<TokenId> = encoder.encode(text);
    let windows = chunk_tokens(&tokens, chunk_size, overlap)?;
    Ok(windows.into_iter().map(|w| encoder.decode(w)).collect())
}
