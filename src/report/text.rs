use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;

/// Flat text pulled out of a source document.
#[derive(Debug, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub text_length: usize,
    pub file_path: String,
}

/// Agent runtimes hand back download paths with this scheme prefix.
pub fn strip_sandbox_prefix(path: &str) -> &str {
    path.strip_prefix("sandbox:").unwrap_or(path)
}

/// Extracts the full text of a report document. PDF input goes through
/// the PDF text extractor; anything else is read as plain UTF-8 text.
/// Missing files and empty extractions are errors, never partial output.
pub fn extract_text(file_path: &str) -> Result<ExtractedText> {
    let clean_path = strip_sandbox_prefix(file_path);
    let path = Path::new(clean_path);

    if !path.exists() {
        return Err(anyhow!("File not found at {}", clean_path));
    }

    log::info!("Extracting text from {}", clean_path);

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    let text = if is_pdf {
        pdf_extract::extract_text(path)
            .map_err(|e| anyhow!("Failed to extract text from PDF {}: {}", clean_path, e))?
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read {}: {}", clean_path, e))?
    };

    if text.is_empty() {
        return Err(anyhow!("No text extracted from {}", clean_path));
    }

    Ok(ExtractedText {
        text_length: text.len(),
        text,
        file_path: file_path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn strips_sandbox_prefix_only() {
        assert_eq!(strip_sandbox_prefix("sandbox:/tmp/report.pdf"), "/tmp/report.pdf");
        assert_eq!(strip_sandbox_prefix("/tmp/report.pdf"), "/tmp/report.pdf");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = extract_text("/nonexistent/report.pdf").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn reads_plain_text_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, "FORM 10-K annual report").unwrap();

        let extracted = extract_text(path.to_str().unwrap()).unwrap();
        assert_eq!(extracted.text, "FORM 10-K annual report");
        assert_eq!(extracted.text_length, 23);
    }

    #[test]
    fn empty_extraction_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        let err = extract_text(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("No text extracted"));
    }
}
