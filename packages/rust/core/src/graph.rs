//! Keyword-overlap graph between the units of one run.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use tracing::{info, instrument};

use coursegraph_shared::{
    GraphStats, KnowledgeRelation, KnowledgeUnit, RELATION_TYPE_RELATED, Result, new_id,
};
use coursegraph_storage::Storage;

/// Shared keywords listed in a relation description.
const DESCRIPTION_KEYWORDS: usize = 5;

/// Result of a graph build.
#[derive(Debug, Clone)]
pub struct GraphOutcome {
    pub relations: usize,
    pub stats: GraphStats,
}

/// Edge strength for `shared` common keywords.
pub fn relation_strength(shared: usize) -> f64 {
    (shared as f64 / 3.0).min(1.0)
}

/// Relations for every pair `i < j` (in `units` order) sharing a keyword.
///
/// Pairs are found through a keyword → position index rather than comparing
/// every pair, but the output matches the pairwise scan exactly.
pub fn build_relations(units: &[KnowledgeUnit], course_id: &str) -> Vec<KnowledgeRelation> {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (position, unit) in units.iter().enumerate() {
        let mut seen = HashSet::new();
        for keyword in &unit.keywords {
            if seen.insert(keyword.as_str()) {
                index.entry(keyword.as_str()).or_default().push(position);
            }
        }
    }

    let now = Utc::now();
    let mut relations = Vec::new();

    for (i, source) in units.iter().enumerate() {
        // Later units sharing a keyword with `source`, with the shared
        // keywords in `source` order.
        let mut shared: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for keyword in &source.keywords {
            if !seen.insert(keyword.as_str()) {
                continue;
            }
            let Some(positions) = index.get(keyword.as_str()) else {
                continue;
            };
            for &j in positions.iter().filter(|&&j| j > i) {
                shared.entry(j).or_default().push(keyword.as_str());
            }
        }

        for (j, keywords) in shared {
            let target = &units[j];
            if target.id == source.id {
                continue;
            }
            relations.push(KnowledgeRelation {
                id: new_id(),
                course_id: course_id.to_string(),
                source_unit_id: source.id.clone(),
                target_unit_id: target.id.clone(),
                relation_type: RELATION_TYPE_RELATED.to_string(),
                strength: relation_strength(keywords.len()),
                description: format!(
                    "关键词: {}",
                    keywords
                        .iter()
                        .take(DESCRIPTION_KEYWORDS)
                        .copied()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                created_at: now,
            });
        }
    }

    relations
}

/// Build and store the relations for `units`, then refresh the course's
/// graph statistics.
#[instrument(skip_all, fields(course_id = %course_id, units = units.len()))]
pub async fn build_graph(
    storage: &Storage,
    units: &[KnowledgeUnit],
    course_id: &str,
) -> Result<GraphOutcome> {
    let relations = build_relations(units, course_id);
    storage.insert_relations(&relations).await?;
    let stats = storage.refresh_graph_stats(course_id).await?;

    info!(
        relations = relations.len(),
        total_units = stats.total_units,
        total_relations = stats.total_relations,
        "knowledge graph updated"
    );

    Ok(GraphOutcome {
        relations: relations.len(),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_shared::UnitType;

    fn unit(keywords: &[&str]) -> KnowledgeUnit {
        KnowledgeUnit {
            id: new_id(),
            course_id: "course-1".into(),
            document_id: Some("doc-1".into()),
            name: keywords.join("/"),
            content: String::new(),
            full_content: None,
            unit_type: UnitType::Point,
            level: 3,
            parent_id: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            importance: 3,
            order_index: 0,
            created_at: Utc::now(),
        }
    }

    /// Pairwise reference: (source, target, shared count) per edge.
    fn pairwise(units: &[KnowledgeUnit]) -> Vec<(usize, usize, usize)> {
        let mut edges = Vec::new();
        for i in 0..units.len() {
            for j in i + 1..units.len() {
                let a: HashSet<_> = units[i].keywords.iter().collect();
                let b: HashSet<_> = units[j].keywords.iter().collect();
                let k = a.intersection(&b).count();
                if k > 0 {
                    edges.push((i, j, k));
                }
            }
        }
        edges
    }

    #[test]
    fn one_shared_keyword_makes_one_weak_edge() {
        let units = vec![unit(&["排序", "算法", "复杂度"]), unit(&["算法", "数据", "结构"])];
        let relations = build_relations(&units, "course-1");

        assert_eq!(relations.len(), 1);
        let edge = &relations[0];
        assert_eq!(edge.source_unit_id, units[0].id);
        assert_eq!(edge.target_unit_id, units[1].id);
        assert!((edge.strength - 1.0 / 3.0).abs() < 1e-9);
        assert!(edge.description.contains("算法"));
        assert_eq!(edge.relation_type, RELATION_TYPE_RELATED);
    }

    #[test]
    fn strength_saturates() {
        assert!((relation_strength(1) - 0.3333).abs() < 1e-3);
        assert_eq!(relation_strength(3), 1.0);
        assert_eq!(relation_strength(10), 1.0);
    }

    #[test]
    fn description_lists_at_most_five_in_source_order() {
        let keywords = ["g", "f", "e", "d", "c", "b", "a"];
        let mut reversed = keywords;
        reversed.reverse();
        let units = vec![unit(&keywords), unit(&reversed)];

        let relations = build_relations(&units, "course-1");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].description, "关键词: g, f, e, d, c");
        assert_eq!(relations[0].strength, 1.0);
    }

    #[test]
    fn empty_keyword_sets_never_link() {
        let units = vec![unit(&[]), unit(&[]), unit(&["树"]), unit(&["图"])];
        assert!(build_relations(&units, "course-1").is_empty());
    }

    #[test]
    fn matches_pairwise_scan() {
        let units = vec![
            unit(&["a", "b", "c"]),
            unit(&["c", "d"]),
            unit(&[]),
            unit(&["a", "d", "e"]),
            unit(&["b", "c", "a", "x"]),
            unit(&["y"]),
            unit(&["x", "y", "c"]),
        ];
        let relations = build_relations(&units, "course-1");
        let position = |id: &str| units.iter().position(|u| u.id == id).unwrap();

        let got: Vec<_> = relations
            .iter()
            .map(|r| {
                let i = position(&r.source_unit_id);
                let j = position(&r.target_unit_id);
                assert_ne!(i, j);
                (i, j, (r.strength * 3.0).round() as usize)
            })
            .collect();

        let expected: Vec<_> = pairwise(&units)
            .into_iter()
            .map(|(i, j, k)| (i, j, k.min(3)))
            .collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn build_graph_refreshes_stats() {
        let tmp = std::env::temp_dir().join(format!("cg_graph_{}.db", new_id()));
        let storage = Storage::open(&tmp).await.expect("open db");

        let units = vec![unit(&["排序", "算法"]), unit(&["算法"]), unit(&["图"])];
        storage.insert_units(&units, &[]).await.expect("insert units");

        let outcome = build_graph(&storage, &units, "course-1").await.expect("graph");
        assert_eq!(outcome.relations, 1);
        assert_eq!(outcome.stats.total_units, 3);
        assert_eq!(outcome.stats.total_relations, 1);
        assert_eq!(outcome.stats.graph_depth, 3);
    }
}
