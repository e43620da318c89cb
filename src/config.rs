use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::services::book::BookSummarizer;
use crate::services::llm::{CompletionClient, OpenAiClient};
use crate::services::profile::ModelProfile;
use crate::services::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};
use crate::services::summarizer::{ChapterEngine, DEFAULT_CHUNK_OVERLAP, DEFAULT_SUMMARY_RESERVE};
use crate::services::triage::{DEFAULT_TRIAGE_CHARS, Triage};

/// Prompt templates. Any field missing from a prompts file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub summarizer_prompt: String,
    pub summarizer_instruction: String,
    pub combiner_prompt: String,
    pub chapter_prompt: String,
    pub chapter_instruction: String,
    pub worthiness_prompt: String,
    pub worthiness_instruction: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Prompts {
            summarizer_prompt: "You are a skilled textual analyst that can synthesize the key concepts in \
                long text and identify crucial details to retain."
                .to_string(),
            summarizer_instruction: "Make a list of the key points made by the author in the following chapter. \
                Under each point, list out the reasons or evidence given."
                .to_string(),
            combiner_prompt: "I will provide you with several summaries of different parts of a chapter. \
                Combine these summaries into one single summary. The final summary should \
                have a list of the key points made by the author in the following chapter. \
                Under each point, list out the reasons or evidence given."
                .to_string(),
            chapter_prompt: "Your job is to deduce the title of a section of a book based on its content. \
                It may be a Title page, Index, Chapter, Copyright Page or any other part of a book. \
                Respond only with the title you have deduced and nothing else. \
                If the chapter has a number, put it before the chapter title, as in Chapter 2: A New Dawn. \
                If the content is not a clearly defined section of a book, write 'unknown'."
                .to_string(),
            chapter_instruction: "Here are the first 500 characters of a section of a book. \
                Please deduce the title of this section:"
                .to_string(),
            worthiness_prompt: "Your job is to evaluate a sample of text to see if it is part of a section \
                worth summarizing. You respond only with boolean values: 'True' if the text is worth \
                summarizing, 'False' if it is not."
                .to_string(),
            worthiness_instruction: "Here are the first 500 characters of a section of a book. \
                Respond True if the section is a chapter, preface, or other section worth summarizing. \
                Respond False if the section is a title page, table of contents, or otherwise not worth summarizing."
                .to_string(),
        }
    }
}

impl Prompts {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompts file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse prompts file {}", path.display()))
    }
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "LLM_API_URL", default_value = "https://api.openai.com")]
    pub api_url: String,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl LlmArgs {
    pub fn client(&self) -> Arc<dyn CompletionClient> {
        Arc::new(OpenAiClient::new(self.api_url.clone(), self.api_key.clone()))
    }
}

#[derive(Args, Debug, Clone)]
pub struct SummarizerArgs {
    /// Model that summarizes each chunk and judges worthiness.
    #[arg(long, env = "SUMMARIZER_MODEL", default_value = "gpt-3.5-turbo")]
    pub summarizer_model: String,

    /// Model that merges chunk summaries and deduces titles.
    #[arg(long, env = "COMBINER_MODEL", default_value = "gpt-4o")]
    pub combiner_model: String,

    /// Tokens kept free in the summarizer context for its own reply.
    #[arg(long, env = "SUMMARY_RESERVE", default_value_t = DEFAULT_SUMMARY_RESERVE)]
    pub summary_reserve: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,

    /// Leading characters of a chapter shown to the triage prompts.
    #[arg(long, env = "TRIAGE_CHARS", default_value_t = DEFAULT_TRIAGE_CHARS)]
    pub triage_chars: usize,

    #[arg(long, env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Chapters processed at once; defaults to the number of cores.
    #[arg(long, env = "CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// JSON file overriding any of the prompt templates.
    #[arg(long, env = "PROMPTS_FILE")]
    pub prompts: Option<PathBuf>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

impl SummarizerArgs {
    pub fn prompts(&self) -> Result<Prompts> {
        match &self.prompts {
            Some(path) => Prompts::load(path),
            None => Ok(Prompts::default()),
        }
    }

    /// Validates every model identity and window setting before any call is made.
    pub fn build(&self) -> Result<BookSummarizer> {
        self.build_with_client(self.llm.client())
    }

    pub fn build_with_client(&self, client: Arc<dyn CompletionClient>) -> Result<BookSummarizer> {
        let summarizer = ModelProfile::from_name(&self.summarizer_model, client.clone())
            .context("invalid summarizer model")?;
        let combiner = ModelProfile::from_name(&self.combiner_model, client)
            .context("invalid combiner model")?;
        let prompts = Arc::new(self.prompts()?);
        let retry = RetryPolicy::default().with_max_retries(self.max_retries);

        let engine = ChapterEngine::new(
            summarizer.clone(),
            combiner.clone(),
            prompts.clone(),
            retry,
        )
        .with_window(self.summary_reserve, self.chunk_overlap)?;
        let triage = Triage::new(combiner, summarizer, prompts, retry, self.triage_chars);

        let mut book = BookSummarizer::new(triage, engine);
        if let Some(limit) = self.concurrency {
            book = book.with_concurrency(limit);
        }
        Ok(book)
    }
}
