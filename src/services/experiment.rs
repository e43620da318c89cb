use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::ExperimentRecord;

pub const DEFAULT_LOG: &str = "prompting_log.md";

pub fn render_entry(record: &ExperimentRecord) -> String {
    format!(
        "## Log Entry - {}\n**Model:** {}\n**System Prompt:** {}\n**Instruction:** {}\n**Summary:**\n{}\n\n---\n",
        record.timestamp, record.model, record.system_prompt, record.instruction, record.summary
    )
}

/// Appends one entry to a Markdown prompting log, creating the file if needed.
pub fn append_to(record: &ExperimentRecord, path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log {}", path.display()))?;
    file.write_all(render_entry(record).as_bytes())?;
    Ok(())
}
