//! Keyword list loading.
//!
//! Keywords come from repeated `--keyword` flags and/or a text file with one
//! keyword per line. Blank lines and `#` comments are ignored. The merged
//! list is trimmed and deduplicated, keeping first occurrences in order.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::AppError;

/// Parse keyword file contents.
pub fn parse_keyword_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().trim_start_matches('\u{feff}').trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a keyword file.
pub fn read_keyword_file(path: &Path) -> Result<Vec<String>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read keyword file '{}': {e}", path.display())))?;
    Ok(parse_keyword_lines(&text))
}

/// Trim and deduplicate, preserving first-occurrence order.
pub fn dedup_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Merge flag keywords and file keywords into the final list.
pub fn load_keywords(flags: &[String], file: Option<&Path>) -> Result<Vec<String>, AppError> {
    let mut all: Vec<String> = flags.to_vec();
    if let Some(path) = file {
        all.extend(read_keyword_file(path)?);
    }
    let keywords = dedup_keywords(all);
    if keywords.is_empty() {
        return Err(AppError::new(
            2,
            "No keywords given. Use `--keyword <word>` or `--keywords-file <file>`.",
        ));
    }
    Ok(keywords)
}
