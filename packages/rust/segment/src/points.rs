//! Per-section knowledge point extraction.
//!
//! Every section becomes one chapter draft plus whatever subsections,
//! definitions, list points and examples its text marks up. Drafts reference
//! their parent by position so ids can be assigned later in one pass.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use coursegraph_shared::{PointsConfig, UnitType};
use coursegraph_shared::text::{char_len, truncate_chars};

use crate::sections::{Section, starts_with_heading};

/// A knowledge unit before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDraft {
    pub name: String,
    pub content: String,
    /// Untruncated text, kept for chapters only.
    pub full_content: Option<String>,
    pub unit_type: UnitType,
    pub level: u32,
    pub importance: u32,
    /// Order among siblings of the same kind.
    pub order: u32,
    /// Position of the parent draft in the same draft list.
    pub parent: Option<usize>,
    pub keywords: Vec<String>,
}

impl UnitDraft {
    fn child(
        name: String,
        content: String,
        unit_type: UnitType,
        level: u32,
        importance: u32,
        order: usize,
    ) -> Self {
        Self {
            name,
            content,
            full_content: None,
            unit_type,
            level,
            importance,
            order: order as u32,
            parent: Some(0),
            keywords: Vec::new(),
        }
    }
}

/// Extract drafts for one section.
///
/// The chapter draft is always at position 0 and every other draft points at
/// it. `section_number` is 1-based.
pub fn extract_points(
    section: &Section,
    section_number: usize,
    config: &PointsConfig,
) -> Vec<UnitDraft> {
    let content = section.content.as_str();

    let mut drafts = vec![UnitDraft {
        name: section.title.clone(),
        content: truncate_chars(content, config.chapter_summary_chars).to_string(),
        full_content: Some(content.to_string()),
        unit_type: UnitType::Chapter,
        level: 1,
        importance: 5,
        order: section_number as u32,
        parent: None,
        keywords: Vec::new(),
    }];

    let subsections = extract_subsections(content, config);
    let definitions = extract_definitions(content, config);
    let points = extract_list_points(content, config);
    let examples = extract_examples(content, config);

    debug!(
        section = section_number,
        subsections = subsections.len(),
        definitions = definitions.len(),
        points = points.len(),
        examples = examples.len(),
        "section points extracted"
    );

    let offset = subsections.len();
    drafts.extend(subsections.into_iter().enumerate().map(|(i, (name, body))| {
        UnitDraft::child(name, body, UnitType::Section, 2, 4, i)
    }));
    drafts.extend(definitions.into_iter().enumerate().map(|(i, (term, definition))| {
        UnitDraft::child(term, definition, UnitType::Definition, 2, 4, offset + i)
    }));
    drafts.extend(points.into_iter().enumerate().map(|(i, (name, body))| {
        UnitDraft::child(name, body, UnitType::Point, 3, 3, i)
    }));
    drafts.extend(examples.into_iter().enumerate().map(|(i, (name, body))| {
        UnitDraft::child(name, body, UnitType::Example, 3, 3, i)
    }));

    drafts
}

// ---------------------------------------------------------------------------
// Subsections
// ---------------------------------------------------------------------------

/// Subsection numbering styles, tried in order.
static SUBSECTION_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?m)^[ \t\x{3000}]*\d+\.\d+[ \t\x{3000}：:]+",
        r"[（(]\d+[）)][ \t\x{3000}]*",
        r"[①②③④⑤⑥⑦⑧⑨⑩][ \t\x{3000}]*",
        r"(?m)^[ \t\x{3000}]*[a-zA-Z][.)][ \t\x{3000}]+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// `(name, content)` pairs from the first numbering style with enough matches.
fn extract_subsections(text: &str, config: &PointsConfig) -> Vec<(String, String)> {
    for pattern in SUBSECTION_MARKERS.iter() {
        let markers: Vec<_> = pattern.find_iter(text).collect();
        if markers.len() < config.subsection_min_matches {
            continue;
        }

        let subsections: Vec<_> = markers
            .iter()
            .enumerate()
            .filter_map(|(i, m)| {
                let end = markers.get(i + 1).map_or(text.len(), |next| next.start());
                let name = text[m.end()..end].lines().next().unwrap_or("").trim();
                let body = text[m.start()..end].trim();
                if name.is_empty() || body.is_empty() {
                    return None;
                }
                Some((
                    truncate_chars(name, config.subsection_name_chars).to_string(),
                    truncate_chars(body, config.subsection_content_chars).to_string(),
                ))
            })
            .collect();

        if !subsections.is_empty() {
            return subsections;
        }
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。！？!?\n]|\.(?:\s|$)").expect("valid regex"));

/// Phrases that join a term to its definition.
const DEFINITION_CONNECTORS: &[&str] = &[
    "是指",
    "定义为",
    "指的是",
    " is defined as ",
    " refers to ",
    " means ",
];

/// Sentences followed by a terminator. Trailing unterminated text is ignored.
fn terminated_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(text) {
        let sentence = text[start..m.start()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    sentences
}

/// Text after the last clause separator.
fn clause_tail(s: &str) -> &str {
    s.rfind(['，', ',', '；', ';', '、'])
        .map_or(s, |idx| {
            let sep_len = s[idx..].chars().next().map_or(0, char::len_utf8);
            &s[idx + sep_len..]
        })
        .trim()
}

/// `(term, definition)` pairs, grouped by rule in rule order.
fn extract_definitions(text: &str, config: &PointsConfig) -> Vec<(String, String)> {
    let sentences = terminated_sentences(text);
    let mut found = Vec::new();

    let mut accept = |term: &str, definition: &str| {
        let term_len = char_len(term);
        let def_len = char_len(definition);
        if (config.term_min_chars..=config.term_max_chars).contains(&term_len)
            && (config.definition_min_chars..=config.definition_max_chars).contains(&def_len)
        {
            found.push((term.to_string(), definition.to_string()));
        }
    };

    for connector in DEFINITION_CONNECTORS {
        for sentence in &sentences {
            if let Some(pos) = sentence.find(connector) {
                accept(clause_tail(&sentence[..pos]), sentence[pos + connector.len()..].trim());
            }
        }
    }

    // A section's own heading line ("Chapter 1: ...") is never a definition.
    let sentences: Vec<&str> = sentences
        .into_iter()
        .filter(|sentence| !starts_with_heading(sentence))
        .collect();

    for sentence in &sentences {
        if EXAMPLE_MARKER_RE.find(sentence).is_some_and(|m| m.start() == 0) {
            continue;
        }
        if let Some((term, definition)) = split_on_colon(sentence) {
            accept(clause_tail(term), definition.trim());
        }
    }

    for sentence in &sentences {
        if let Some((term, definition)) = split_on_paren(sentence) {
            accept(clause_tail(term), definition.trim());
        }
    }

    found.truncate(config.max_definitions);
    found
}

fn split_on_colon(sentence: &str) -> Option<(&str, &str)> {
    let pos = sentence.find(['：', ':'])?;
    let sep_len = sentence[pos..].chars().next().map_or(0, char::len_utf8);
    let rest = &sentence[pos + sep_len..];
    // URL schemes are not definitions.
    if rest.starts_with("//") {
        return None;
    }
    Some((&sentence[..pos], rest))
}

fn split_on_paren(sentence: &str) -> Option<(&str, &str)> {
    let open = sentence.find(['(', '（'])?;
    let inner_start = open + sentence[open..].chars().next().map_or(0, char::len_utf8);
    let close = sentence[inner_start..].find([')', '）'])? + inner_start;
    Some((&sentence[..open], &sentence[inner_start..close]))
}

// ---------------------------------------------------------------------------
// List points
// ---------------------------------------------------------------------------

static LIST_ITEM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?m)^[ \t\x{3000}]*[•·\-*][ \t\x{3000}]+(.+)$",
        r"(?m)^[ \t\x{3000}]*\d+[.)、][ \t\x{3000}]+(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// `(name, content)` for bullet and numbered list items.
fn extract_list_points(text: &str, config: &PointsConfig) -> Vec<(String, String)> {
    LIST_ITEM_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .filter_map(|caps| {
            let item = caps.get(1)?.as_str().trim();
            if item.is_empty() {
                return None;
            }
            Some((
                truncate_chars(item, config.point_name_chars).to_string(),
                item.to_string(),
            ))
        })
        .take(config.max_points)
        .collect()
}

// ---------------------------------------------------------------------------
// Examples
// ---------------------------------------------------------------------------

static EXAMPLE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[【\[]?(?:示例|例题|例)[ \t]*[0-9一二三四五六七八九十]*[ \t]*[】\]]?[ \t]*[:：]|(?i:\bexample[ \t]*\d*[ \t]*[:：])",
    )
    .expect("valid regex")
});

/// `(label, content)` for each example marker, spanning to the next marker.
fn extract_examples(text: &str, config: &PointsConfig) -> Vec<(String, String)> {
    let markers: Vec<_> = EXAMPLE_MARKER_RE.find_iter(text).collect();
    let mut examples = Vec::new();

    for (i, m) in markers.iter().enumerate() {
        if examples.len() >= config.max_examples {
            break;
        }
        let end = markers.get(i + 1).map_or(text.len(), |next| next.start());
        let body = text[m.end()..end].trim();
        if body.is_empty() {
            continue;
        }

        let label = m
            .as_str()
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, '【' | '[' | '】' | ']' | ':' | '：'));
        let numbered = label
            .chars()
            .any(|c| c.is_ascii_digit() || "一二三四五六七八九十".contains(c));
        let name = if numbered {
            label.to_string()
        } else {
            format!("{label} {}", examples.len() + 1)
        };

        examples.push((name, truncate_chars(body, config.example_content_chars).to_string()));
    }
    examples
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
