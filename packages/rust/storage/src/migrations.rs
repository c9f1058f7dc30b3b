//! SQL migration definitions for the CourseGraph database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents, tasks, units, relations, search index, graph stats",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Uploaded course documents
CREATE TABLE IF NOT EXISTS documents (
    id                  TEXT PRIMARY KEY,
    course_id           TEXT NOT NULL,
    file_name           TEXT NOT NULL,
    file_path           TEXT NOT NULL,
    file_type           TEXT NOT NULL,
    document_type       TEXT NOT NULL DEFAULT 'material',
    processed_status    TEXT NOT NULL DEFAULT 'pending',
    processing_progress INTEGER NOT NULL DEFAULT 0,
    extracted_text      TEXT,
    content_hash        TEXT,
    error_message       TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_course ON documents(course_id);

-- One row per ingestion run
CREATE TABLE IF NOT EXISTS processing_tasks (
    id            TEXT PRIMARY KEY,
    document_id   TEXT NOT NULL,
    task_type     TEXT NOT NULL,
    status        TEXT NOT NULL,
    progress      INTEGER NOT NULL DEFAULT 0,
    current_step  INTEGER NOT NULL DEFAULT 0,
    total_steps   INTEGER NOT NULL,
    result_json   TEXT,
    error_message TEXT,
    started_at    TEXT,
    completed_at  TEXT,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_document ON processing_tasks(document_id);

-- Knowledge hierarchy
CREATE TABLE IF NOT EXISTS knowledge_units (
    id            TEXT PRIMARY KEY,
    course_id     TEXT NOT NULL,
    document_id   TEXT,
    name          TEXT NOT NULL,
    content       TEXT NOT NULL,
    full_content  TEXT,
    unit_type     TEXT NOT NULL,
    level         INTEGER NOT NULL,
    parent_id     TEXT REFERENCES knowledge_units(id),
    keywords_json TEXT NOT NULL DEFAULT '[]',
    importance    INTEGER NOT NULL,
    order_index   INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_units_course ON knowledge_units(course_id);
CREATE INDEX IF NOT EXISTS idx_units_document ON knowledge_units(document_id);

-- Keyword-overlap edges
CREATE TABLE IF NOT EXISTS knowledge_relations (
    id             TEXT PRIMARY KEY,
    course_id      TEXT NOT NULL,
    source_unit_id TEXT NOT NULL REFERENCES knowledge_units(id),
    target_unit_id TEXT NOT NULL REFERENCES knowledge_units(id),
    relation_type  TEXT NOT NULL,
    strength       REAL NOT NULL,
    description    TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    CHECK (source_unit_id <> target_unit_id)
);

CREATE INDEX IF NOT EXISTS idx_relations_course ON knowledge_relations(course_id);

-- Retrieval chunks, rebuildable from knowledge_units
CREATE TABLE IF NOT EXISTS search_index (
    id            TEXT PRIMARY KEY,
    document_id   TEXT NOT NULL,
    course_id     TEXT NOT NULL,
    unit_id       TEXT NOT NULL,
    document_type TEXT NOT NULL,
    chunk_text    TEXT NOT NULL,
    chunk_index   INTEGER NOT NULL,
    metadata_json TEXT NOT NULL,
    UNIQUE(document_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_search_course ON search_index(course_id);

-- Per-course graph summary
CREATE TABLE IF NOT EXISTS graph_stats (
    course_id       TEXT PRIMARY KEY,
    total_units     INTEGER NOT NULL,
    total_relations INTEGER NOT NULL,
    graph_depth     INTEGER NOT NULL,
    updated_at      TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
