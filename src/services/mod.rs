pub mod book;
pub mod chapterizer;
pub mod chunker;
pub mod experiment;
pub mod llm;
pub mod profile;
pub mod retry;
pub mod stats;
pub mod summarizer;
pub mod tokenizer;
pub mod triage;

#[cfg(test)]
pub mod test_support;
