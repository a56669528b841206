use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Document contains no extractable text")]
    Empty,

    #[error("Text extraction failed: {0}")]
    Malformed(String),
}

/// Turns document bytes into linear text, one line per `\n`.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extractor backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let raw = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        let text = normalize_extracted_text(&raw);
        if text.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }
        debug!(chars = text.len(), lines = text.lines().count(), "Extracted document text");
        Ok(text)
    }
}

/// Unifies line endings and strips trailing whitespace on every line.
///
/// Leading and trailing blank lines are dropped; interior blank lines are kept
/// because they carry paragraph spacing.
pub fn normalize_extracted_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map(|i| i + 1)
        .unwrap_or(start);
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unifies_line_endings() {
        let raw = "Jane Doe  \r\nEngineer\rRust\n";
        assert_eq!(normalize_extracted_text(raw), "Jane Doe\nEngineer\nRust");
    }

    #[test]
    fn test_normalize_keeps_interior_blank_lines() {
        let raw = "\n\nSummary\n\nExperience\n\n\n";
        assert_eq!(normalize_extracted_text(raw), "Summary\n\nExperience");
    }

    #[test]
    fn test_normalize_all_blank_is_empty() {
        assert_eq!(normalize_extracted_text("  \n \n"), "");
    }

    #[test]
    fn test_extractor_rejects_non_pdf() {
        let result = PdfTextExtractor.extract(b"plain bytes, not a document");
        assert!(result.is_err());
    }
}
