use std::sync::Arc;

use tracing::debug;

use crate::config::Prompts;
use crate::models::{ChapterSummary, ExperimentRecord};
use crate::services::chunker::{ChunkError, chunk_text};
use crate::services::profile::ModelProfile;
use crate::services::retry::{CallError, RetryPolicy, call_with_retry};

// gpt-3.5-turbo summaries of 12k-token chapters came back around 500 tokens.
pub const DEFAULT_SUMMARY_RESERVE: usize = 1500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Window(#[from] ChunkError),
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Map-then-reduce summarizer for a single chapter.
#[derive(Debug, Clone)]
pub struct ChapterEngine {
    summarizer: ModelProfile,
    combiner: ModelProfile,
    prompts: Arc<Prompts>,
    retry: RetryPolicy,
    summary_reserve: usize,
    overlap: usize,
}

impl ChapterEngine {
    pub fn new(
        summarizer: ModelProfile,
        combiner: ModelProfile,
        prompts: Arc<Prompts>,
        retry: RetryPolicy,
    ) -> Self {
        ChapterEngine {
            summarizer,
            combiner,
            prompts,
            retry,
            summary_reserve: DEFAULT_SUMMARY_RESERVE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    /// Sets the reply reserve and overlap, rejecting windows that cannot advance.
    pub fn with_window(mut self, summary_reserve: usize, overlap: usize) -> Result<Self, ChunkError> {
        self.summary_reserve = summary_reserve;
        self.overlap = overlap;
        self.chunk_size()?;
        Ok(self)
    }

    pub fn chunk_size(&self) -> Result<usize, ChunkError> {
        let size = self
            .summarizer
            .max_context_tokens()
            .saturating_sub(self.summary_reserve);
        if size > self.overlap {
            Ok(size)
        } else {
            Err(ChunkError::InvalidWindow {
                chunk_size: size,
                overlap: self.overlap,
            })
        }
    }

    pub fn summarizer(&self) -> &ModelProfile {
        &self.summarizer
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub async fn summarize_chapter(&self, text: &str) -> Result<ChapterSummary, SummarizeError> {
        let chunk_size = self.chunk_size()?;
        let chunks = chunk_text(self.summarizer.encoder(), text, chunk_size, self.overlap)?;
        debug!(chunks = chunks.len(), chunk_size, "chapter chunked");

        // Map: one summary per chunk, in chapter order
        let mut appended = String::new();
        let mut first = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let instruction = format!("{}\n{}", self.prompts.summarizer_instruction, chunk);
            let summary = call_with_retry(
                &self.summarizer,
                &self.prompts.summarizer_prompt,
                &instruction,
                &self.retry,
            )
            .await?;
            debug!(chunk = i, model = self.summarizer.name(), "chunk summarized");
            appended.push_str(&summary);
            appended.push('\n');
            first.get_or_insert(summary);
        }

        let mut models = vec![self.summarizer.name().to_string()];
        if chunks.len() <= 1 {
            return Ok(ChapterSummary {
                text: first.unwrap_or_default(),
                chunk_count: chunks.len(),
                models,
            });
        }

        // Reduce: a single combine pass over all chunk summaries
        let instruction = format!("{}\n{}", self.prompts.combiner_prompt, appended);
        let combined = call_with_retry(
            &self.combiner,
            &self.prompts.summarizer_prompt,
            &instruction,
            &self.retry,
        )
        .await?;
        models.push(self.combiner.name().to_string());

        Ok(ChapterSummary {
            text: combined,
            chunk_count: chunks.len(),
            models,
        })
    }

    /// One un-chunked call with explicit prompts, returned as an experiment record.
    pub async fn summarize_text(
        &self,
        text: &str,
        profile: &ModelProfile,
        system_prompt: &str,
        instruction: &str,
    ) -> Result<ExperimentRecord, CallError> {
        let request = format!("{instruction}\n{text}");
        let summary = call_with_retry(profile, system_prompt, &request, &self.retry).await?;
        Ok(ExperimentRecord {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            model: profile.name().to_string(),
            system_prompt: system_prompt.to_string(),
            instruction: instruction.to_string(),
            summary,
            text: text.to_string(),
        })
    }
}
