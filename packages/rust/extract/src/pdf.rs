//! PDF text extraction backed by `lopdf`.
//!
//! Pages are read one at a time so a page whose content stream cannot be
//! decoded only loses that page.

use std::path::Path;

use tracing::{debug, warn};

use coursegraph_shared::{CourseGraphError, Result};

/// Extract per-page text in page order, joined with blank lines.
///
/// Pages that yield no text are skipped; a PDF without any text yields `""`.
pub fn extract_pdf(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| CourseGraphError::extraction(path, e))?;
    extract_pdf_bytes(&bytes).map_err(|e| CourseGraphError::extraction(path, e))
}

/// Extract text from an in-memory PDF.
pub fn extract_pdf_bytes(bytes: &[u8]) -> std::result::Result<String, lopdf::Error> {
    let doc = lopdf::Document::load_mem(bytes)?;
    let pages = doc.get_pages();

    let mut texts: Vec<String> = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => texts.push(text.trim_end().to_string()),
            Ok(_) => debug!(page = page_number, "page has no text"),
            Err(e) => warn!(page = page_number, error = %e, "skipping unreadable page"),
        }
    }

    debug!(pages = pages.len(), with_text = texts.len(), "pdf pages read");
    Ok(texts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build a one-page PDF whose content stream is empty.
    fn blank_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save pdf");
        buf
    }

    #[test]
    fn blank_pdf_yields_empty_text() {
        let text = extract_pdf_bytes(&blank_pdf()).expect("extract blank pdf");
        assert_eq!(text, "");
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(extract_pdf_bytes(b"not a pdf at all").is_err());
    }

    #[test]
    fn path_errors_carry_the_path() {
        let path = std::env::temp_dir().join(format!("cg_pdf_{}.pdf", std::process::id()));
        std::fs::write(&path, b"%PDF-broken").unwrap();

        let err = extract_pdf(&path).unwrap_err();
        match err {
            CourseGraphError::ExtractionFailed { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }

        let _ = std::fs::remove_file(&path);
    }
}
