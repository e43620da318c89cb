use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::warn;

use crate::config::Prompts;
use crate::models::{ChapterMetadata, UNKNOWN_TITLE};
use crate::services::profile::ModelProfile;
use crate::services::retry::{RetryPolicy, call_with_retry};
use crate::utils::char_prefix;

pub const DEFAULT_TRIAGE_CHARS: usize = 500;

fn boolean_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?i)\btrue\b").unwrap(),
            Regex::new(r"(?i)\bfalse\b").unwrap(),
        )
    })
}

/// Reads a yes/no answer out of free text. "true" anywhere wins over
/// "false"; a reply with neither counts as true.
pub fn find_boolean(text: &str) -> bool {
    let (true_re, false_re) = boolean_patterns();
    if true_re.is_match(text) {
        return true;
    }
    if false_re.is_match(text) {
        return false;
    }
    true
}

// A title has to fit on the `## ` heading line.
fn first_line(reply: &str) -> Option<&str> {
    reply.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Title and worthiness checks that only look at the start of a chapter.
#[derive(Debug, Clone)]
pub struct Triage {
    title_model: ModelProfile,
    worthiness_model: ModelProfile,
    prompts: Arc<Prompts>,
    retry: RetryPolicy,
    prefix_len: usize,
}

impl Triage {
    pub fn new(
        title_model: ModelProfile,
        worthiness_model: ModelProfile,
        prompts: Arc<Prompts>,
        retry: RetryPolicy,
        prefix_len: usize,
    ) -> Self {
        Triage {
            title_model,
            worthiness_model,
            prompts,
            retry,
            prefix_len,
        }
    }

    pub async fn deduce_title(&self, text: &str) -> String {
        let instruction = format!(
            "{}\n{}",
            self.prompts.chapter_instruction,
            char_prefix(text, self.prefix_len)
        );
        match call_with_retry(
            &self.title_model,
            &self.prompts.chapter_prompt,
            &instruction,
            &self.retry,
        )
        .await
        {
            Ok(reply) => first_line(&reply)
                .unwrap_or(UNKNOWN_TITLE)
                .to_string(),
            Err(e) => {
                warn!(error = %e, "title deduction failed");
                UNKNOWN_TITLE.to_string()
            }
        }
    }

    pub async fn deduce_worthiness(&self, text: &str) -> bool {
        let instruction = format!(
            "{}\n{}",
            self.prompts.worthiness_instruction,
            char_prefix(text, self.prefix_len)
        );
        match call_with_retry(
            &self.worthiness_model,
            &self.prompts.worthiness_prompt,
            &instruction,
            &self.retry,
        )
        .await
        {
            Ok(reply) => find_boolean(&reply),
            Err(e) => {
                warn!(error = %e, "worthiness check failed, keeping chapter");
                true
            }
        }
    }

    pub async fn chapter_metadata(&self, index: usize, chapter: Arc<str>) -> ChapterMetadata {
        let title = self.deduce_title(&chapter).await;
        let worthy = self.deduce_worthiness(&chapter).await;
        ChapterMetadata {
            index,
            title,
            worthy,
            chapter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::LlmError;
    use crate::services::test_support::ScriptedClient;

    fn triage(client: Arc<ScriptedClient>, prefix_len: usize) -> Triage {
        Triage::new(
            ModelProfile::from_name("gpt-4o", client.clone()).unwrap(),
            ModelProfile::from_name("gpt-3.5-turbo", client).unwrap(),
            Arc::new(Prompts::default()),
            RetryPolicy::default(),
            prefix_len,
        )
    }

    #[test]
    fn true_wins_when_both_words_appear() {
        assert!(find_boolean("The answer is FALSE and also true"));
        assert!(find_boolean("True."));
    }

    #[test]
    fn false_alone_is_false() {
        assert!(!find_boolean("false"));
        assert!(!find_boolean("I'd say: False, it is a table of contents."));
    }

    #[test]
    fn ambiguous_reply_fails_open() {
        assert!(find_boolean("Probably not worth it"));
        assert!(find_boolean(""));
        // whole words only
        assert!(find_boolean("falsehood"));
        assert!(!find_boolean("untrue, so false"));
    }

    #[tokio::test]
    async fn only_the_prefix_is_sent() {
        let client = Arc::new(ScriptedClient::replying(["  Chapter 1: Down the Mine \n"]));
        let text = format!("{}{}", "é".repeat(10), "x".repeat(100));

        let title = triage(client.clone(), 12).deduce_title(&text).await;

        assert_eq!(title, "Chapter 1: Down the Mine");
        let call = &client.calls()[0];
        assert_eq!(call.model, "gpt-4o");
        assert!(call.instruction.ends_with(&format!("\n{}xx", "é".repeat(10))));
    }

    #[tokio::test]
    async fn blank_or_failed_title_is_unknown() {
        let client = Arc::new(ScriptedClient::with_results([
            Ok("   ".to_string()),
            Err(LlmError::Api {
                status: 500,
                body: "boom".into(),
            }),
        ]));
        let triage = triage(client, 500);
        assert_eq!(triage.deduce_title("text").await, "unknown");
        assert_eq!(triage.deduce_title("text").await, "unknown");
    }

    #[tokio::test]
    async fn multi_line_title_keeps_the_first_line() {
        let client = Arc::new(ScriptedClient::replying(["\n  Chapter 1\nDown the Mine\n"]));
        let title = triage(client, 500).deduce_title("text").await;
        assert_eq!(title, "Chapter 1");
    }

    #[tokio::test]
    async fn worthiness_uses_the_summarizer_model() {
        let client = Arc::new(ScriptedClient::replying(["False"]));
        let worthy = triage(client.clone(), 500)
            .deduce_worthiness("Contents\n1. Chapter One")
            .await;
        assert!(!worthy);
        assert_eq!(client.calls()[0].model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn failed_worthiness_call_keeps_the_chapter() {
        let client = Arc::new(ScriptedClient::with_results([Err(LlmError::Parse(
            "garbled".into(),
        ))]));
        assert!(triage(client, 500).deduce_worthiness("text").await);
    }
}
