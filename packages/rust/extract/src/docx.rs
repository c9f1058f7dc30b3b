//! Word (`.docx`) text extraction.
//!
//! Reads `word/document.xml` out of the zip container and walks its tags.
//! Body paragraphs come first in document order, followed by every table row
//! (cells joined with `" | "`); the source interleaving of tables and
//! paragraphs is not preserved.

use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use coursegraph_shared::{CourseGraphError, Result};

/// Path of the main document part inside the container.
const DOCUMENT_PART: &str = "word/document.xml";

/// Separator placed between table cells of one row.
const CELL_SEPARATOR: &str = " | ";

/// Extract paragraph and table text from the `.docx` file at `path`.
pub fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| CourseGraphError::extraction(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| CourseGraphError::extraction(path, e))?;

    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| CourseGraphError::extraction(path, format!("missing {DOCUMENT_PART}")))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| CourseGraphError::extraction(path, e))?;

    Ok(document_xml_to_text(&xml))
}

/// Convert the WordprocessingML of `document.xml` to plain text.
pub fn document_xml_to_text(xml: &str) -> String {
    let mut body = BodyCollector::default();
    let mut rest = xml;

    while let Some(lt) = rest.find('<') {
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            break;
        };
        let tag = &after[..gt];
        rest = &after[gt + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");

        match (name, closing) {
            ("w:t", false) if !self_closing => {
                let end = rest.find("</w:t>").unwrap_or(rest.len());
                body.push_text(&unescape_xml(&rest[..end]));
                rest = &rest[end..];
            }
            ("w:tab", false) if !body.in_tab_stops => body.push_text("\t"),
            ("w:br" | "w:cr", false) => body.push_text("\n"),
            ("w:tabs", false) if !self_closing => body.in_tab_stops = true,
            ("w:tabs", true) => body.in_tab_stops = false,
            ("w:p", false) if !self_closing => body.start_paragraph(),
            ("w:p", true) => body.end_paragraph(),
            ("w:tbl", false) => body.table_depth += 1,
            ("w:tbl", true) => body.table_depth = body.table_depth.saturating_sub(1),
            ("w:tr", false) if body.table_depth == 1 => body.row.clear(),
            ("w:tr", true) if body.table_depth == 1 => body.end_row(),
            ("w:tc", false) if body.table_depth == 1 => body.cell.clear(),
            ("w:tc", true) if body.table_depth == 1 => body.end_cell(),
            _ => {}
        }
    }

    body.finish()
}

/// Accumulates paragraphs and table rows while walking the document tags.
#[derive(Default)]
struct BodyCollector {
    paragraphs: Vec<String>,
    table_rows: Vec<String>,
    table_depth: usize,
    paragraph_depth: usize,
    paragraph: String,
    /// Paragraph texts of the current table cell.
    cell: Vec<String>,
    /// Cell texts of the current table row.
    row: Vec<String>,
    in_tab_stops: bool,
}

impl BodyCollector {
    fn start_paragraph(&mut self) {
        // Nested paragraphs (text boxes) fold into the enclosing one.
        if self.paragraph_depth == 0 {
            self.paragraph.clear();
        }
        self.paragraph_depth += 1;
    }

    fn push_text(&mut self, text: &str) {
        if self.paragraph_depth > 0 {
            self.paragraph.push_str(text);
        }
    }

    fn end_paragraph(&mut self) {
        if self.paragraph_depth == 0 {
            return;
        }
        self.paragraph_depth -= 1;
        if self.paragraph_depth > 0 {
            return;
        }

        let text = std::mem::take(&mut self.paragraph);
        if self.table_depth > 0 {
            self.cell.push(text);
        } else if !text.trim().is_empty() {
            self.paragraphs.push(text);
        }
    }

    fn end_cell(&mut self) {
        let text = self.cell.join("\n").trim().to_string();
        self.cell.clear();
        self.row.push(text);
    }

    fn end_row(&mut self) {
        if self.row.iter().any(|cell| !cell.is_empty()) {
            self.table_rows.push(self.row.join(CELL_SEPARATOR));
        }
        self.row.clear();
    }

    fn finish(self) -> String {
        let mut blocks = self.paragraphs;
        blocks.extend(self.table_rows);
        blocks.join("\n\n")
    }
}

/// Resolve the predefined XML entities and numeric character references.
fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn wrap_body(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
    }

    fn para(text: &str) -> String {
        format!(r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    fn cell(text: &str) -> String {
        format!("<w:tc><w:tcPr/>{}</w:tc>", para(text))
    }

    #[test]
    fn paragraphs_then_tables() {
        let body = format!(
            "{}<w:tbl><w:tblPr/><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>{}<w:p/>{}",
            para("第一章 导论"),
            cell("术语"),
            cell("含义"),
            cell(" 算法 "),
            cell("解决问题的步骤"),
            para("课程目标"),
            para("   "),
        );
        let text = document_xml_to_text(&wrap_body(&body));
        assert_eq!(
            text,
            "第一章 导论\n\n课程目标\n\n术语 | 含义\n\n算法 | 解决问题的步骤"
        );
    }

    #[test]
    fn runs_tabs_and_breaks() {
        let body = r#"<w:p><w:r><w:t>A</w:t></w:r><w:r><w:tab/><w:t>B</w:t><w:br/><w:t>C</w:t></w:r></w:p>"#;
        assert_eq!(document_xml_to_text(&wrap_body(body)), "A\tB\nC");
    }

    #[test]
    fn empty_table_rows_are_skipped() {
        let body = format!("<w:tbl><w:tr>{}{}</w:tr></w:tbl>", cell(""), cell(" "));
        assert_eq!(document_xml_to_text(&wrap_body(&body)), "");
    }

    #[test]
    fn entities_are_unescaped() {
        assert_eq!(unescape_xml("a &lt; b &amp;&amp; c &gt; d"), "a < b && c > d");
        assert_eq!(unescape_xml("&#x4E2D;&#25991;"), "中文");
        assert_eq!(unescape_xml("AT&T; & co"), "AT&T; & co");
    }

    #[test]
    fn reads_docx_container() {
        let path = std::env::temp_dir().join(format!("cg_docx_{}.docx", std::process::id()));
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            zip.start_file(DOCUMENT_PART, options).unwrap();
            zip.write_all(wrap_body(&para("数据结构")).as_bytes())
                .unwrap();
            zip.finish().unwrap();
        }

        let text = extract_docx(&path).expect("extract docx");
        assert_eq!(text, "数据结构");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn non_zip_input_fails() {
        let path = std::env::temp_dir().join(format!("cg_docx_bad_{}.docx", std::process::id()));
        std::fs::write(&path, b"plain bytes").unwrap();

        let err = extract_docx(&path).unwrap_err();
        assert!(matches!(err, CourseGraphError::ExtractionFailed { .. }));

        let _ = std::fs::remove_file(&path);
    }
}
