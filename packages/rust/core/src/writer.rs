//! Persistence writer: unit drafts → stored knowledge units and search entries.
//!
//! Drafts live in a [`DraftArena`] and point at their parent by position.
//! Ids are allocated for every draft first, then units are written in level
//! order, so a parent id is always known before any child refers to it.

use chrono::Utc;
use tracing::{info, instrument};

use coursegraph_segment::UnitDraft;
use coursegraph_shared::text::truncate_chars;
use coursegraph_shared::{
    DocumentType, KnowledgeUnit, PersistenceConfig, Result, SearchIndexEntry, SearchMetadata,
    new_id,
};
use coursegraph_storage::Storage;

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Every draft of one run, addressed by position.
#[derive(Debug, Clone, Default)]
pub struct DraftArena {
    drafts: Vec<UnitDraft>,
}

impl DraftArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one section's drafts, rebasing their parent positions onto the arena.
    pub fn push_section(&mut self, drafts: Vec<UnitDraft>) {
        let offset = self.drafts.len();
        self.drafts.extend(drafts.into_iter().map(|mut draft| {
            draft.parent = draft.parent.map(|p| p + offset);
            draft
        }));
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn drafts(&self) -> &[UnitDraft] {
        &self.drafts
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, UnitDraft> {
        self.drafts.iter_mut()
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Where the units of a run belong.
#[derive(Debug, Clone, Copy)]
pub struct UnitOwner<'a> {
    pub course_id: &'a str,
    pub document_id: &'a str,
    pub document_type: DocumentType,
}

/// Turn drafts into units and search entries, in write order.
pub fn build_units(
    arena: &DraftArena,
    owner: UnitOwner<'_>,
    config: &PersistenceConfig,
) -> (Vec<KnowledgeUnit>, Vec<SearchIndexEntry>) {
    let drafts = arena.drafts();
    let ids: Vec<String> = drafts.iter().map(|_| new_id()).collect();

    let mut write_order: Vec<usize> = (0..drafts.len()).collect();
    write_order.sort_by_key(|&i| drafts[i].level);

    let now = Utc::now();
    let mut units = Vec::with_capacity(drafts.len());
    let mut entries = Vec::with_capacity(drafts.len());

    for (position, &i) in write_order.iter().enumerate() {
        let draft = &drafts[i];
        let parent_id = if draft.level == 1 {
            None
        } else {
            draft.parent.and_then(|p| ids.get(p)).cloned()
        };

        let content = truncate_chars(&draft.content, config.unit_content_chars);
        let keywords: Vec<String> = draft
            .keywords
            .iter()
            .take(config.max_keywords)
            .cloned()
            .collect();

        let unit = KnowledgeUnit {
            id: ids[i].clone(),
            course_id: owner.course_id.to_string(),
            document_id: Some(owner.document_id.to_string()),
            name: truncate_chars(&draft.name, config.unit_name_chars).to_string(),
            content: content.to_string(),
            full_content: draft
                .full_content
                .as_deref()
                .map(|full| truncate_chars(full, config.full_content_chars).to_string()),
            unit_type: draft.unit_type,
            level: draft.level,
            parent_id,
            keywords,
            importance: draft.importance,
            order_index: draft.order,
            created_at: now,
        };

        entries.push(SearchIndexEntry {
            id: new_id(),
            document_id: owner.document_id.to_string(),
            course_id: owner.course_id.to_string(),
            unit_id: unit.id.clone(),
            document_type: owner.document_type,
            chunk_text: truncate_chars(content, config.index_content_chars).to_string(),
            chunk_index: position as u32,
            metadata: SearchMetadata {
                unit_name: unit.name.clone(),
                unit_type: unit.unit_type,
                level: unit.level,
                keywords: unit.keywords.clone(),
                document_type: owner.document_type,
            },
        });
        units.push(unit);
    }

    (units, entries)
}

/// Write every draft of a run in one transaction and return the stored units
/// in write order.
///
/// The document's classification is read from its row; a missing row counts
/// as course material.
#[instrument(skip_all, fields(document_id = %document_id, drafts = arena.len()))]
pub async fn persist_units(
    storage: &Storage,
    arena: &DraftArena,
    course_id: &str,
    document_id: &str,
    config: &PersistenceConfig,
) -> Result<Vec<KnowledgeUnit>> {
    let document_type = storage
        .get_document(document_id)
        .await?
        .map(|doc| doc.document_type)
        .unwrap_or_default();

    let owner = UnitOwner {
        course_id,
        document_id,
        document_type,
    };
    let (units, entries) = build_units(arena, owner, config);
    storage.insert_units(&units, &entries).await?;

    info!(units = units.len(), %document_type, "knowledge units persisted");
    Ok(units)
}
