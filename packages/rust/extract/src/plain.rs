//! Plain text / Markdown extraction with candidate-encoding fallback.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

use coursegraph_shared::{CourseGraphError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a text file, trying each encoding label in order until one decodes
/// without malformed sequences.
pub fn extract_text_file(path: &Path, encodings: &[String]) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| CourseGraphError::extraction(path, e))?;

    decode_with_candidates(&bytes, encodings).ok_or_else(|| CourseGraphError::Decode {
        path: path.to_path_buf(),
        tried: encodings.to_vec(),
    })
}

/// Decode `bytes` with the first candidate that accepts them.
pub fn decode_with_candidates(bytes: &[u8], encodings: &[String]) -> Option<String> {
    for label in encodings {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            warn!(label = %label, "unknown encoding label, skipping");
            continue;
        };

        let input = if encoding == UTF_8 {
            bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
        } else {
            bytes
        };

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(input) {
            debug!(encoding = encoding.name(), "decoded text file");
            return Some(text.into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_labels() -> Vec<String> {
        coursegraph_shared::ExtractionConfig::default().text_encodings
    }

    #[test]
    fn utf8_decodes_first() {
        let text = decode_with_candidates("算法与数据结构".as_bytes(), &default_labels());
        assert_eq!(text.as_deref(), Some("算法与数据结构"));
    }

    #[test]
    fn bom_is_dropped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("导论".as_bytes());
        assert_eq!(
            decode_with_candidates(&bytes, &default_labels()).as_deref(),
            Some("导论")
        );
    }

    #[test]
    fn falls_back_to_gbk() {
        let (gbk, _, had_errors) = encoding_rs::GBK.encode("计算机科学");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&gbk).is_err());

        let text = decode_with_candidates(&gbk, &default_labels());
        assert_eq!(text.as_deref(), Some("计算机科学"));
    }

    #[test]
    fn no_candidate_is_decode_error() {
        let path = std::env::temp_dir().join(format!("cg_plain_{}.txt", std::process::id()));
        std::fs::write(&path, [0xFFu8, 0xFE, 0xFF]).unwrap();

        let err = extract_text_file(&path, &["utf-8".to_string()]).unwrap_err();
        assert!(matches!(err, CourseGraphError::Decode { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_file_is_empty_text() {
        let path = std::env::temp_dir().join(format!("cg_plain_empty_{}.txt", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let text = extract_text_file(&path, &default_labels()).expect("empty file");
        assert_eq!(text, "");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unknown_labels_are_skipped() {
        let labels = vec!["not-an-encoding".to_string(), "utf-8".to_string()];
        assert_eq!(decode_with_candidates(b"abc", &labels).as_deref(), Some("abc"));
    }
}
