use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

static BLANK_RUNS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Extract a PDF's text, normalized for markdown use.
pub fn pdf_to_text(input: &Path) -> Result<String> {
    let text = pdf_extract::extract_text(input)
        .with_context(|| format!("failed to extract text from {}", input.display()))?;
    Ok(normalize_text(&text))
}

/// Convert a PDF to a markdown file at `output`.
pub fn pdf_to_markdown(input: &Path, output: &Path) -> Result<()> {
    let markdown = pdf_to_text(input)?;
    std::fs::write(output, markdown.as_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

/// Collapse the blank-line runs that page breaks leave behind.
pub fn normalize_text(text: &str) -> String {
    let collapsed = BLANK_RUNS_RE.replace_all(text, "\n\n");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_runs_collapse() {
        let text = "page one\n\n\n\n\npage two\n";
        assert_eq!(normalize_text(text), "page one\n\npage two\n");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_text("   \n\n  "), "");
    }

    #[test]
    fn paragraph_breaks_survive() {
        let text = "alpha\n\nbeta";
        assert_eq!(normalize_text(text), "alpha\n\nbeta\n");
    }
}
