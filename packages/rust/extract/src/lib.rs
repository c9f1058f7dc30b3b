//! Format-specific raw text extraction for uploaded course documents.
//!
//! One entry point, [`extract`], maps `(path, declared type)` to a single text blob:
//! - `pdf` — per-page text joined with blank lines ([`pdf`])
//! - `docx`/`doc` — body paragraphs, then table rows ([`docx`])
//! - `txt`/`md` — first candidate encoding that decodes cleanly ([`plain`])
//!
//! Extraction is blocking; async callers should run it on a blocking thread.

pub mod docx;
pub mod pdf;
pub mod plain;

use std::path::Path;

use tracing::{info, instrument};

use coursegraph_shared::{CourseGraphError, ExtractionConfig, Result};

/// File formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    PlainText,
}

impl FileKind {
    /// Resolve a declared file type (`".PDF"`, `"docx"`, ...) to a format.
    pub fn from_declared(file_type: &str) -> Result<Self> {
        let ext = file_type.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" | "doc" => Ok(Self::Word),
            "txt" | "md" => Ok(Self::PlainText),
            _ => Err(CourseGraphError::UnsupportedFormat(file_type.to_string())),
        }
    }

    /// Short name for tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Word => "word",
            Self::PlainText => "text",
        }
    }
}

/// Extract the full text of the document at `path`.
///
/// A document that yields no text returns `""`; that is not an error.
#[instrument(skip(config), fields(path = %path.display()))]
pub fn extract(path: &Path, file_type: &str, config: &ExtractionConfig) -> Result<String> {
    let kind = FileKind::from_declared(file_type)?;

    let text = match kind {
        FileKind::Pdf => pdf::extract_pdf(path)?,
        FileKind::Word => docx::extract_docx(path)?,
        FileKind::PlainText => plain::extract_text_file(path, &config.text_encodings)?,
    };

    info!(
        format = kind.name(),
        chars = text.chars().count(),
        "text extracted"
    );

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_resolve() {
        assert_eq!(FileKind::from_declared(".PDF").unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::from_declared("docx").unwrap(), FileKind::Word);
        assert_eq!(FileKind::from_declared(".doc").unwrap(), FileKind::Word);
        assert_eq!(FileKind::from_declared("md").unwrap(), FileKind::PlainText);
        assert_eq!(FileKind::from_declared(".txt").unwrap(), FileKind::PlainText);
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let err = FileKind::from_declared(".pptx").unwrap_err();
        assert!(matches!(err, CourseGraphError::UnsupportedFormat(_)));
        assert!(err.to_string().contains(".pptx"));
    }

    #[test]
    fn extract_dispatches_to_plain_text() {
        let path = std::env::temp_dir().join(format!(
            "cg_extract_{}.md",
            std::process::id()
        ));
        std::fs::write(&path, "# 导论\n课程概述").unwrap();

        let text = extract(&path, ".md", &ExtractionConfig::default()).expect("extract");
        assert_eq!(text, "# 导论\n课程概述");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_wraps_as_extraction_failure() {
        let path = std::env::temp_dir().join("cg_extract_does_not_exist.pdf");
        let err = extract(&path, "pdf", &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, CourseGraphError::ExtractionFailed { .. }));
    }
}
