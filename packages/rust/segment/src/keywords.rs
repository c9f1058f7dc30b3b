//! Frequency-based keyword summarization.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use coursegraph_shared::KeywordsConfig;
use coursegraph_shared::text::char_len;

/// CJK ideograph runs of two or more, or ASCII letter runs of three or more.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{4e00}-\x{9fa5}]{2,}|[a-zA-Z]{3,}").expect("valid regex")
});

/// Most frequent tokens of `content`, ties broken by first occurrence.
pub fn extract_keywords(content: &str, config: &KeywordsConfig) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for token in TOKEN_RE.find_iter(content).map(|m| m.as_str()) {
        let len = char_len(token);
        if len < config.min_chars || len > config.max_chars {
            continue;
        }
        match index.get(token) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(token, counts.len());
                counts.push((token, 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(config.max_keywords)
        .map(|(token, _)| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> KeywordsConfig {
        KeywordsConfig::default()
    }

    #[test]
    fn frequency_then_first_seen() {
        let text = "tree graph graph 排序，算法，排序；graph tree 算法 算法";
        let keywords = extract_keywords(text, &cfg());
        assert_eq!(keywords, vec!["graph", "算法", "tree", "排序"]);
    }

    #[test]
    fn short_and_long_runs_are_dropped() {
        let long = "a".repeat(21);
        let text = format!("ab 的 {long} abc 数据");
        assert_eq!(extract_keywords(&text, &cfg()), vec!["abc", "数据"]);
    }

    #[test]
    fn capped_and_unique() {
        let text = (0..40)
            .map(|i: u8| format!("k{}{}", (b'a' + i / 26) as char, (b'a' + i % 26) as char))
            .collect::<Vec<_>>()
            .join(" ");
        let keywords = extract_keywords(&text, &cfg());
        assert_eq!(keywords.len(), 15);

        let mut deduped = keywords.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), keywords.len());
        assert!(keywords.iter().all(|k| (2..=20).contains(&char_len(k))));
    }

    #[test]
    fn empty_content_has_no_keywords() {
        assert!(extract_keywords("", &cfg()).is_empty());
        assert!(extract_keywords("12 34 ， 。", &cfg()).is_empty());
    }
}
