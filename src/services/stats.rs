use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{BookStats, ModelTokenStats};
use crate::services::llm::LlmError;
use crate::services::profile::ModelSpec;
use crate::utils::thousands;

const FREQUENCY_ROWS: usize = 200;

fn word_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+|[^\w\s]").unwrap())
}

/// Words and punctuation marks, the way a reader would count them.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    word_token().find_iter(text).map(|m| m.as_str())
}

pub fn analyze(chapters: &[String], models: &[ModelSpec]) -> Result<BookStats, LlmError> {
    let chapter_words: Vec<usize> = chapters.iter().map(|c| words(c).count()).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for chapter in chapters {
        for word in words(chapter) {
            *counts.entry(word).or_default() += 1;
        }
    }
    let mut word_frequencies: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(word, count)| (word.to_string(), count))
        .collect();
    word_frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut per_model = BTreeMap::new();
    for spec in models {
        let encoder = spec.encoder()?;
        let chapter_tokens: Vec<usize> = chapters.iter().map(|c| encoder.count(c)).collect();
        let total_tokens = chapter_tokens.iter().sum();
        per_model.insert(
            spec.name.to_string(),
            ModelTokenStats {
                total_tokens,
                chapter_tokens,
                cost: spec.cost_of(total_tokens),
            },
        );
    }

    Ok(BookStats {
        total_words: chapter_words.iter().sum(),
        chapter_words,
        models: per_model,
        word_frequencies,
    })
}

pub fn render_markdown(stats: &BookStats) -> String {
    let mut out = String::from("# Book Statistics\n\n## Overview\n\n");
    out.push_str(&format!(
        "Total Word Count: {}\n\n",
        thousands(stats.total_words)
    ));

    out.push_str("| Model | Cost |\n|-------|------|\n");
    for (model, model_stats) in &stats.models {
        out.push_str(&format!("| {model} | ${:.2} |\n", model_stats.cost));
    }
    out.push('\n');

    let models: Vec<&String> = stats.models.keys().collect();
    out.push_str("## Word and Token Counts per Chapter\n\n");
    let mut header = String::from("| Chapter | Words |");
    let mut rule = String::from("|---------|-------|");
    for model in &models {
        header.push_str(&format!(" {model} Tokens |"));
        rule.push_str("-------------|");
    }
    out.push_str(&format!("{header}\n{rule}\n"));
    for (i, words) in stats.chapter_words.iter().enumerate() {
        let mut row = format!("| {} | {} |", i + 1, thousands(*words));
        for model in &models {
            let tokens = stats.models[*model].chapter_tokens[i];
            row.push_str(&format!(" {} |", thousands(tokens)));
        }
        out.push_str(&row);
        out.push('\n');
    }
    out.push('\n');

    out.push_str(&format!(
        "## Word Frequencies (First {FREQUENCY_ROWS} Words)\n\n"
    ));
    out.push_str("| Word | Frequency |\n|------|-----------|\n");
    for (word, count) in stats.word_frequencies.iter().take(FREQUENCY_ROWS) {
        out.push_str(&format!("| {word} | {count} |\n"));
    }
    out
}
