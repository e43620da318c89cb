use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Body written for chapters triaged as not worth summarizing.
pub const SKIPPED_PLACEHOLDER: &str = "Evaluated as not worth summarizing.";

/// Title used when the model cannot deduce one.
pub const UNKNOWN_TITLE: &str = "unknown";

#[derive(Debug, Clone)]
pub struct ChapterMetadata {
    pub index: usize,
    pub title: String,
    pub worthy: bool,
    pub chapter: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    pub text: String,
    pub chunk_count: usize,
    // Provenance for logging only.
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionOutcome {
    Summarized,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSection {
    pub index: usize,
    pub title: String,
    pub body: String,
    pub outcome: SectionOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSummary {
    pub sections: Vec<ChapterSection>,
}

impl BookSummary {
    pub fn summarized_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.outcome == SectionOutcome::Summarized)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentRecord {
    pub timestamp: String,
    pub model: String,
    pub system_prompt: String,
    pub instruction: String,
    pub summary: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelTokenStats {
    pub total_tokens: usize,
    pub chapter_tokens: Vec<usize>,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookStats {
    pub total_words: usize,
    pub chapter_words: Vec<usize>,
    pub models: BTreeMap<String, ModelTokenStats>,
    pub word_frequencies: Vec<(String, usize)>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub chapter_count: usize,
    pub summarized_count: usize,
    pub download_url: String,
}
