use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::models::{
    BookSummary, ChapterMetadata, ChapterSection, SKIPPED_PLACEHOLDER, SectionOutcome,
    UNKNOWN_TITLE,
};
use crate::services::summarizer::ChapterEngine;
use crate::services::triage::Triage;

/// Runs `task` over every item with at most `limit` in flight. Results land
/// in the slot of their input index; a panicked task leaves `None`.
async fn fan_out<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    let mut slots: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();

    for (idx, item) in items.into_iter().enumerate() {
        let sem = sem.clone();
        let fut = task(item);
        set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            (idx, fut.await)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => error!(error = %e, "chapter task failed"),
        }
    }
    slots
}

#[derive(Debug, Clone)]
pub struct BookSummarizer {
    triage: Triage,
    engine: ChapterEngine,
    concurrency: Option<usize>,
}

impl BookSummarizer {
    pub fn new(triage: Triage, engine: ChapterEngine) -> Self {
        BookSummarizer {
            triage,
            engine,
            concurrency: None,
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit.max(1));
        self
    }

    pub fn engine(&self) -> &ChapterEngine {
        &self.engine
    }

    fn worker_limit(&self, chapters: usize) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.concurrency.unwrap_or(cores).min(chapters).max(1)
    }

    pub async fn summarize_book(&self, chapters: Vec<String>) -> BookSummary {
        let total = chapters.len();
        let limit = self.worker_limit(total);
        let chapters: Vec<Arc<str>> = chapters.into_iter().map(Arc::from).collect();

        // Phase 1: triage every chapter
        info!(chapters = total, workers = limit, "triaging chapters");
        let triage = self.triage.clone();
        let metadata: Vec<ChapterMetadata> = fan_out(
            chapters.iter().cloned().enumerate().collect(),
            limit,
            |(index, chapter): (usize, Arc<str>)| {
                let triage = triage.clone();
                async move { triage.chapter_metadata(index, chapter).await }
            },
        )
        .await
        .into_iter()
        .zip(chapters)
        .enumerate()
        .map(|(index, (meta, chapter))| {
            meta.unwrap_or(ChapterMetadata {
                index,
                title: UNKNOWN_TITLE.to_string(),
                worthy: true,
                chapter,
            })
        })
        .collect();

        // Phase 2: keep the worthy ones, remembering where they came from
        let worthy: Vec<(usize, Arc<str>)> = metadata
            .iter()
            .filter(|m| m.worthy)
            .map(|m| (m.index, m.chapter.clone()))
            .collect();
        let worthy_indices: Vec<usize> = worthy.iter().map(|(i, _)| *i).collect();

        // Phase 3: summarize
        info!(worthy = worthy.len(), skipped = total - worthy.len(), "summarizing chapters");
        let engine = self.engine.clone();
        let summaries = fan_out(worthy, limit, |(index, chapter): (usize, Arc<str>)| {
            let engine = engine.clone();
            async move {
                let result = engine.summarize_chapter(&chapter).await;
                match &result {
                    Ok(summary) => info!(
                        chapter = index,
                        chunks = summary.chunk_count,
                        models = ?summary.models,
                        "chapter summarized"
                    ),
                    Err(e) => error!(chapter = index, error = %e, "chapter summarization failed"),
                }
                result
            }
        })
        .await;

        // Phase 4: merge back into chapter order
        let mut bodies: Vec<Option<(String, SectionOutcome)>> = (0..total).map(|_| None).collect();
        for (index, result) in worthy_indices.into_iter().zip(summaries) {
            bodies[index] = Some(match result {
                Some(Ok(summary)) => (summary.text, SectionOutcome::Summarized),
                Some(Err(e)) => (format!("Error: {e}"), SectionOutcome::Failed),
                None => (
                    "Error: summarization task aborted".to_string(),
                    SectionOutcome::Failed,
                ),
            });
        }

        let sections = metadata
            .into_iter()
            .zip(bodies)
            .map(|(meta, body)| {
                let (body, outcome) = body
                    .unwrap_or_else(|| (SKIPPED_PLACEHOLDER.to_string(), SectionOutcome::Skipped));
                ChapterSection {
                    index: meta.index,
                    title: meta.title,
                    body,
                    outcome,
                }
            })
            .collect();

        BookSummary { sections }
    }
}

/// One `## title` section per chapter, in chapter order.
pub fn render_markdown(summary: &BookSummary) -> String {
    let mut out = String::new();
    for section in &summary.sections {
        out.push_str(&format!("## {}\n", section.title));
        out.push_str(&section.body);
        out.push_str("\n\n");
    }
    out
}
