//! Section splitting.
//!
//! Strategies are tried in priority order; the first one that produces at
//! least one section wins. The built-in order is numbered markers, then
//! blank-line paragraphs, then long lines.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use coursegraph_shared::SegmentationConfig;
use coursegraph_shared::text::{char_len, truncate_chars};

/// A contiguous span of the document treated as one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub level: u32,
    /// 0-based position in source order.
    pub order: usize,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One way of cutting normalized text into sections.
pub trait SectionStrategy: Send + Sync {
    /// Split `text`. An empty result hands over to the next strategy.
    fn split(&self, text: &str, config: &SegmentationConfig) -> Vec<Section>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds section strategies in priority order.
pub struct Segmenter {
    strategies: Vec<Box<dyn SectionStrategy>>,
}

impl Segmenter {
    /// Create a segmenter with the built-in cascade.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(MarkerStrategy),
                Box::new(ParagraphStrategy),
                Box::new(LineStrategy),
            ],
        }
    }

    /// Create a segmenter with a custom cascade.
    pub fn with_strategies(strategies: Vec<Box<dyn SectionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Split `text` into ordered sections.
    ///
    /// Whitespace-only input yields no sections.
    pub fn segment(&self, text: &str, config: &SegmentationConfig) -> Vec<Section> {
        let normalized = normalize_line_endings(text);
        if normalized.trim().is_empty() {
            return Vec::new();
        }

        for strategy in &self.strategies {
            let sections = strategy.split(&normalized, config);
            if !sections.is_empty() {
                debug!(
                    strategy = strategy.name(),
                    sections = sections.len(),
                    "segmentation strategy selected"
                );
                return sections;
            }
        }
        Vec::new()
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `text` with the built-in cascade.
pub fn segment(text: &str, config: &SegmentationConfig) -> Vec<Section> {
    Segmenter::new().segment(text, config)
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Numbered markers
// ---------------------------------------------------------------------------

/// Chapter-style marker patterns, most specific first.
static MARKER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[【\[]?第[一二三四五六七八九十零〇百千万\d]+(?:章|节|课|讲|部分|部|篇)[】\]]?",
        r"(?i)chapter\s+\d+",
        r"(?m)^\d+[.、．]",
        r"(?m)^[一二三四五六七八九十百千]+[、．.]",
        r"[【\[]第[一二三四五六七八九十\d]+部分[】\]]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static HEADING_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[【\[]?第[一二三四五六七八九十零〇百千万\d]+(?:章|节|课|讲|部分|部|篇)[】\]]?|(?i:chapter\s+\d+))",
    )
    .expect("valid regex")
});

/// Whether `line` opens with a chapter heading such as `第一章` or `Chapter 3`.
pub(crate) fn starts_with_heading(line: &str) -> bool {
    HEADING_PREFIX_RE.is_match(line.trim_start())
}

/// Sections delimited by chapter/part numbering.
///
/// The first pattern with any match defines every section; text before the
/// first marker is not part of any section.
pub struct MarkerStrategy;

impl SectionStrategy for MarkerStrategy {
    fn split(&self, text: &str, config: &SegmentationConfig) -> Vec<Section> {
        for pattern in MARKER_PATTERNS.iter() {
            let markers: Vec<_> = pattern.find_iter(text).collect();
            if markers.is_empty() {
                continue;
            }

            debug!(pattern = pattern.as_str(), markers = markers.len(), "section markers found");

            return markers
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let end = markers.get(i + 1).map_or(text.len(), |next| next.start());
                    let title = marker_title(&text[m.end()..end], config.title_chars)
                        .unwrap_or_else(|| format!("Section {}", i + 1));
                    Section {
                        title,
                        content: text[m.start()..end].trim().to_string(),
                        level: 1,
                        order: i,
                    }
                })
                .collect();
        }
        Vec::new()
    }

    fn name(&self) -> &str {
        "markers"
    }
}

/// First line following a marker, without leading whitespace or colons.
fn marker_title(after_marker: &str, max_chars: usize) -> Option<String> {
    let rest = after_marker.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '：');
    let line = rest.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        None
    } else {
        Some(truncate_chars(line, max_chars).to_string())
    }
}

// ---------------------------------------------------------------------------
// Paragraph fallback
// ---------------------------------------------------------------------------

static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// One section per blank-line-delimited paragraph above the length threshold.
pub struct ParagraphStrategy;

impl SectionStrategy for ParagraphStrategy {
    fn split(&self, text: &str, config: &SegmentationConfig) -> Vec<Section> {
        BLANK_LINE_RE
            .split(text)
            .map(str::trim)
            .filter(|p| char_len(p) > config.paragraph_min_chars)
            .enumerate()
            .map(|(i, p)| Section {
                title: truncate_chars(p, config.fallback_title_chars).to_string(),
                content: p.to_string(),
                level: 1,
                order: i,
            })
            .collect()
    }

    fn name(&self) -> &str {
        "paragraphs"
    }
}

// ---------------------------------------------------------------------------
// Line fallback
// ---------------------------------------------------------------------------

/// One section per long line, capped.
pub struct LineStrategy;

impl SectionStrategy for LineStrategy {
    fn split(&self, text: &str, config: &SegmentationConfig) -> Vec<Section> {
        text.lines()
            .map(str::trim)
            .filter(|l| char_len(l) > config.line_min_chars)
            .take(config.max_line_sections)
            .enumerate()
            .map(|(i, l)| Section {
                title: truncate_chars(l, config.fallback_title_chars).to_string(),
                content: l.to_string(),
                level: 1,
                order: i,
            })
            .collect()
    }

    fn name(&self) -> &str {
        "lines"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn cfg() -> SegmentationConfig {
        SegmentationConfig::default()
    }

    #[test]
    fn chinese_chapters_split_in_order() {
        let text = "前言不计入\n第一章 导论\n课程概述。\n第二章：算法基础\n排序与查找。";
        let sections = segment(text, &cfg());

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "导论");
        assert_eq!(sections[0].content, "第一章 导论\n课程概述。");
        assert_eq!(sections[0].order, 0);
        assert_eq!(sections[1].title, "算法基础");
        assert_eq!(sections[1].content, "第二章：算法基础\n排序与查找。");
        assert_eq!(sections[1].order, 1);
        assert!(sections.iter().all(|s| s.level == 1));
    }

    #[test]
    fn english_chapters_case_insensitive() {
        let text = "CHAPTER 1 Basics\nintro\nchapter 2 Trees\nmore";
        let sections = segment(text, &cfg());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Basics");
        assert_eq!(sections[1].title, "Trees");
    }

    #[test]
    fn first_matching_pattern_wins() {
        // Line-leading numbers would also match, but 第N章 comes first.
        let text = "第一章 概述\n1. 要点\n2. 要点";
        let sections = segment(text, &cfg());
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("2. 要点"));
    }

    #[test]
    fn marker_without_title_gets_fallback_name() {
        let sections = segment("【第1部分】\n\n【第2部分】 数据", &cfg());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Section 1");
        assert_eq!(sections[1].title, "数据");
    }

    #[test]
    fn crlf_is_normalized() {
        let sections = segment("一、绪论\r\n内容\r\n二、方法\r\n步骤", &cfg());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].content, "一、绪论\n内容");
    }

    #[test]
    fn paragraph_fallback() {
        let long = "a".repeat(60);
        let text = format!("{long}\n\n short \n\n{long}b");
        let sections = segment(&text, &cfg());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "a".repeat(60));
        assert_eq!(sections[1].order, 1);
    }

    #[test]
    fn line_fallback_when_no_long_paragraphs() {
        let line = "x".repeat(40);
        let text = format!("{line}\nshort\n{line}y");
        // The whole text is a single 88-char paragraph under the defaults.
        let sections = segment(&text, &cfg());
        let config = SegmentationConfig {
            paragraph_min_chars: 1000,
            ..cfg()
        };
        let by_lines = segment(&text, &config);
        assert_eq!(sections.len(), 1);
        assert_eq!(by_lines.len(), 2);
        assert_eq!(by_lines[1].content, format!("{line}y"));
    }

    #[test]
    fn line_fallback_is_capped() {
        let text = (0..150)
            .map(|i| format!("{i:03}{}", "z".repeat(40)))
            .collect::<Vec<_>>()
            .join("\n");
        let config = SegmentationConfig {
            paragraph_min_chars: usize::MAX,
            ..cfg()
        };
        assert_eq!(segment(&text, &config).len(), 100);
    }

    #[test]
    fn blank_input_has_no_sections() {
        assert!(segment("", &cfg()).is_empty());
        assert!(segment("  \n\t\n ", &cfg()).is_empty());
        assert!(segment("too short", &cfg()).is_empty());
    }

    struct Recording {
        label: &'static str,
        yields: usize,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SectionStrategy for Recording {
        fn split(&self, text: &str, _config: &SegmentationConfig) -> Vec<Section> {
            self.calls.lock().unwrap().push(self.label);
            (0..self.yields)
                .map(|order| Section {
                    title: self.label.to_string(),
                    content: text.to_string(),
                    level: 1,
                    order,
                })
                .collect()
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    #[test]
    fn cascade_stops_at_first_non_empty_strategy() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let segmenter = Segmenter::with_strategies(vec![
            Box::new(Recording { label: "a", yields: 0, calls: calls.clone() }),
            Box::new(Recording { label: "b", yields: 2, calls: calls.clone() }),
            Box::new(Recording { label: "c", yields: 1, calls: calls.clone() }),
        ]);

        let sections = segmenter.segment("text", &cfg());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "b");
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
    }
}
