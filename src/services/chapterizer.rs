use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::utils::decode_utf8;

fn blank_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").unwrap())
}

fn newline_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").unwrap())
}

/// Splits extracted book text into chapters.
///
/// Chapters are separated by blank lines; inside a chapter every run of
/// newlines collapses to one and surrounding whitespace is trimmed.
pub fn split_chapters(text: &str) -> Vec<String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n");

    blank_line()
        .split(&text)
        .map(|block| newline_run().replace_all(block, "\n").trim().to_string())
        .filter(|chapter| !chapter.is_empty())
        .collect()
}

pub fn load_chapters(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        bail!("File {} does not exist.", path.display());
    }
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = decode_utf8(bytes).with_context(|| format!("{} is not UTF-8 text", path.display()))?;

    let chapters = split_chapters(&text);
    if chapters.is_empty() {
        bail!("no chapters found in {}", path.display());
    }
    Ok(chapters)
}
