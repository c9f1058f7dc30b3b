//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding uploaded documents,
//! processing tasks, the knowledge hierarchy and its relations, the search
//! index, and per-course graph statistics.
//!
//! **Access rules:**
//! - Ingestion runs: read-write via [`Storage::open`]
//! - Status and listing commands: read-only via [`Storage::open_readonly`]
//!
//! Runs for different documents share one [`Storage`]. Writes are serialized
//! through a single write lock, and batch writes (units with their search
//! entries, relation sets) hold it for their whole transaction. Every
//! connection also waits on a locked database instead of failing at once, for
//! readers in other processes.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, params};
use tokio::sync::{Mutex, MutexGuard};

use coursegraph_shared::{
    CourseGraphError, Document, DocumentType, GraphStats, KnowledgeRelation, KnowledgeUnit,
    ProcessingStatus, ProcessingTask, ProgressReport, Result, ResultSummary, SearchIndexEntry,
};

const DOCUMENT_COLUMNS: &str = "id, course_id, file_name, file_path, file_type, document_type, \
     processed_status, processing_progress, extracted_text, content_hash, error_message, \
     created_at, updated_at";

const TASK_COLUMNS: &str = "id, document_id, task_type, status, progress, current_step, \
     total_steps, result_json, error_message, started_at, completed_at, updated_at";

const UNIT_COLUMNS: &str = "id, course_id, document_id, name, content, full_content, unit_type, \
     level, parent_id, keywords_json, importance, order_index, created_at";

const RELATION_COLUMNS: &str = "id, course_id, source_unit_id, target_unit_id, relation_type, \
     strength, description, created_at";

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

const SEARCH_COLUMNS: &str = "id, document_id, course_id, unit_id, document_type, chunk_text, \
     chunk_index, metadata_json";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
    conn: Connection,
    readonly: bool,
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CourseGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(CourseGraphError::persistence)?;

        let conn = connect(&db).await?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            write_lock: Mutex::new(()),
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CourseGraphError::persistence(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(CourseGraphError::persistence)?;

        let conn = connect(&db).await?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            write_lock: Mutex::new(()),
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CourseGraphError::persistence(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CourseGraphError::persistence(
                "database is opened in read-only mode",
            ));
        }
        Ok(())
    }

    /// Take the write lock. Held for the duration of one write or one batch
    /// transaction.
    async fn write_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.check_writable()?;
        Ok(self.write_lock.lock().await)
    }

    /// Fresh connection for a batch transaction.
    async fn batch_connection(&self) -> Result<Connection> {
        connect(&self.db).await
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Insert a new document record.
    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        let _write = self.write_guard().await?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO documents ({DOCUMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    doc.id.as_str(),
                    doc.course_id.as_str(),
                    doc.file_name.as_str(),
                    doc.file_path.as_str(),
                    doc.file_type.as_str(),
                    doc.document_type.as_str(),
                    doc.processed_status.as_str(),
                    i64::from(doc.processing_progress),
                    doc.extracted_text.as_deref(),
                    doc.content_hash.as_deref(),
                    doc.error_message.as_deref(),
                    doc.created_at.to_rfc3339(),
                    doc.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        Ok(())
    }

    /// Get a document by ID.
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        match rows.next().await.map_err(CourseGraphError::persistence)? {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    /// Store the extracted text and its hash, and mark the document as processing.
    ///
    /// Returns `false` when no such document exists.
    pub async fn record_extraction(
        &self,
        document_id: &str,
        text: &str,
        content_hash: &str,
        progress: u32,
    ) -> Result<bool> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE documents
                 SET extracted_text = ?1, content_hash = ?2, processing_progress = ?3,
                     processed_status = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    text,
                    content_hash,
                    i64::from(progress),
                    ProcessingStatus::Processing.as_str(),
                    now.as_str(),
                    document_id
                ],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        Ok(changed > 0)
    }

    /// Mark a document fully processed.
    pub async fn complete_document(&self, document_id: &str) -> Result<bool> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE documents
                 SET processed_status = ?1, processing_progress = 100, error_message = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                params![ProcessingStatus::Completed.as_str(), now.as_str(), document_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        Ok(changed > 0)
    }

    /// Mark a document failed with the given message.
    pub async fn fail_document(&self, document_id: &str, message: &str) -> Result<bool> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE documents
                 SET processed_status = ?1, error_message = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![ProcessingStatus::Failed.as_str(), message, now.as_str(), document_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Task operations
    // -----------------------------------------------------------------------

    /// Insert a new processing task.
    pub async fn insert_task(&self, task: &ProcessingTask) -> Result<()> {
        let _write = self.write_guard().await?;
        let result_json = task.result.as_ref().map(encode_json).transpose()?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO processing_tasks ({TASK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    task.id.as_str(),
                    task.document_id.as_str(),
                    task.task_type.as_str(),
                    task.status.as_str(),
                    i64::from(task.progress),
                    i64::from(task.current_step),
                    i64::from(task.total_steps),
                    result_json,
                    task.error_message.as_deref(),
                    task.started_at.map(|t| t.to_rfc3339()),
                    task.completed_at.map(|t| t.to_rfc3339()),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        Ok(())
    }

    /// Move a task to a new checkpoint.
    pub async fn advance_task(
        &self,
        task_id: &str,
        progress: u32,
        step: u32,
        status: ProcessingStatus,
    ) -> Result<()> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE processing_tasks
                 SET progress = ?1, current_step = ?2, status = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    i64::from(progress),
                    i64::from(step),
                    status.as_str(),
                    now.as_str(),
                    task_id
                ],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        ensure_found(changed, "task", task_id)
    }

    /// Mark a task completed with its result summary.
    pub async fn complete_task(&self, task_id: &str, summary: &ResultSummary) -> Result<()> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE processing_tasks
                 SET status = ?1, progress = 100, current_step = total_steps, result_json = ?2,
                     completed_at = ?3, updated_at = ?3
                 WHERE id = ?4",
                params![
                    ProcessingStatus::Completed.as_str(),
                    encode_json(summary)?,
                    now.as_str(),
                    task_id
                ],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        ensure_found(changed, "task", task_id)
    }

    /// Mark a task failed. Progress and step stay at the last checkpoint.
    pub async fn fail_task(&self, task_id: &str, message: &str) -> Result<()> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE processing_tasks
                 SET status = ?1, error_message = ?2, completed_at = ?3, updated_at = ?3
                 WHERE id = ?4",
                params![ProcessingStatus::Failed.as_str(), message, now.as_str(), task_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        ensure_found(changed, "task", task_id)
    }

    /// Get a task by ID.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<ProcessingTask>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM processing_tasks WHERE id = ?1"),
                params![task_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        match rows.next().await.map_err(CourseGraphError::persistence)? {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    /// Most recently created task for a document.
    pub async fn latest_task_for_document(
        &self,
        document_id: &str,
    ) -> Result<Option<ProcessingTask>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM processing_tasks
                     WHERE document_id = ?1 ORDER BY rowid DESC LIMIT 1"
                ),
                params![document_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        match rows.next().await.map_err(CourseGraphError::persistence)? {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    /// Progress of the latest run for a document, for polling clients.
    pub async fn progress_report(&self, document_id: &str) -> Result<Option<ProgressReport>> {
        Ok(self
            .latest_task_for_document(document_id)
            .await?
            .map(ProgressReport::from))
    }

    // -----------------------------------------------------------------------
    // Knowledge unit operations
    // -----------------------------------------------------------------------

    /// Insert units and their search entries in one transaction.
    ///
    /// Units must be ordered so every parent precedes its children.
    pub async fn insert_units(
        &self,
        units: &[KnowledgeUnit],
        entries: &[SearchIndexEntry],
    ) -> Result<()> {
        let _write = self.write_guard().await?;
        let conn = self.batch_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(CourseGraphError::persistence)?;

        for unit in units {
            insert_unit_row(&tx, unit).await?;
        }
        for entry in entries {
            upsert_search_row(&tx, entry).await?;
        }

        tx.commit().await.map_err(CourseGraphError::persistence)?;
        tracing::debug!(units = units.len(), entries = entries.len(), "units committed");
        Ok(())
    }

    /// List a document's units in write order.
    pub async fn list_units_by_document(&self, document_id: &str) -> Result<Vec<KnowledgeUnit>> {
        self.query_units(
            &format!(
                "SELECT {UNIT_COLUMNS} FROM knowledge_units WHERE document_id = ?1 ORDER BY rowid"
            ),
            document_id,
        )
        .await
    }

    /// List a course's units in write order.
    pub async fn list_units_by_course(&self, course_id: &str) -> Result<Vec<KnowledgeUnit>> {
        self.query_units(
            &format!(
                "SELECT {UNIT_COLUMNS} FROM knowledge_units WHERE course_id = ?1 ORDER BY rowid"
            ),
            course_id,
        )
        .await
    }

    async fn query_units(&self, sql: &str, key: &str) -> Result<Vec<KnowledgeUnit>> {
        let mut rows = self
            .conn
            .query(sql, params![key])
            .await
            .map_err(CourseGraphError::persistence)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(CourseGraphError::persistence)? {
            results.push(row_to_unit(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Relation operations
    // -----------------------------------------------------------------------

    /// Insert relations in one transaction.
    pub async fn insert_relations(&self, relations: &[KnowledgeRelation]) -> Result<()> {
        let _write = self.write_guard().await?;
        let conn = self.batch_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(CourseGraphError::persistence)?;

        for relation in relations {
            tx.execute(
                &format!(
                    "INSERT INTO knowledge_relations ({RELATION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    relation.id.as_str(),
                    relation.course_id.as_str(),
                    relation.source_unit_id.as_str(),
                    relation.target_unit_id.as_str(),
                    relation.relation_type.as_str(),
                    relation.strength,
                    relation.description.as_str(),
                    relation.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(CourseGraphError::persistence)?;
        }

        tx.commit().await.map_err(CourseGraphError::persistence)?;
        Ok(())
    }

    /// List a course's relations in write order.
    pub async fn list_relations_by_course(
        &self,
        course_id: &str,
    ) -> Result<Vec<KnowledgeRelation>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RELATION_COLUMNS} FROM knowledge_relations
                     WHERE course_id = ?1 ORDER BY rowid"
                ),
                params![course_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(CourseGraphError::persistence)? {
            results.push(KnowledgeRelation {
                id: text(&row, 0)?,
                course_id: text(&row, 1)?,
                source_unit_id: text(&row, 2)?,
                target_unit_id: text(&row, 3)?,
                relation_type: text(&row, 4)?,
                strength: row.get::<f64>(5).map_err(CourseGraphError::persistence)?,
                description: text(&row, 6)?,
                created_at: timestamp(&row, 7)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Search index
    // -----------------------------------------------------------------------

    /// Insert or replace the entry at `(document_id, chunk_index)`.
    pub async fn upsert_search_entry(&self, entry: &SearchIndexEntry) -> Result<()> {
        let _write = self.write_guard().await?;
        upsert_search_row(&self.conn, entry).await
    }

    /// List a document's search entries by chunk index.
    pub async fn list_search_entries(&self, document_id: &str) -> Result<Vec<SearchIndexEntry>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SEARCH_COLUMNS} FROM search_index
                     WHERE document_id = ?1 ORDER BY chunk_index"
                ),
                params![document_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(CourseGraphError::persistence)? {
            let metadata = text(&row, 7)?;
            results.push(SearchIndexEntry {
                id: text(&row, 0)?,
                document_id: text(&row, 1)?,
                course_id: text(&row, 2)?,
                unit_id: text(&row, 3)?,
                document_type: text(&row, 4)?.parse()?,
                chunk_text: text(&row, 5)?,
                chunk_index: integer(&row, 6)? as u32,
                metadata: decode_json(&metadata)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Graph statistics
    // -----------------------------------------------------------------------

    /// Recompute and store the graph summary for a course.
    pub async fn refresh_graph_stats(&self, course_id: &str) -> Result<GraphStats> {
        let _write = self.write_guard().await?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO graph_stats (course_id, total_units, total_relations, graph_depth, updated_at)
                 VALUES (
                   ?1,
                   (SELECT COUNT(*) FROM knowledge_units WHERE course_id = ?1),
                   (SELECT COUNT(*) FROM knowledge_relations WHERE course_id = ?1),
                   (SELECT COALESCE(MAX(level), 0) FROM knowledge_units WHERE course_id = ?1),
                   ?2
                 )
                 ON CONFLICT(course_id) DO UPDATE SET
                   total_units = excluded.total_units,
                   total_relations = excluded.total_relations,
                   graph_depth = excluded.graph_depth,
                   updated_at = excluded.updated_at",
                params![course_id, now.as_str()],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        self.get_graph_stats(course_id).await?.ok_or_else(|| {
            CourseGraphError::persistence(format!("graph stats missing for course {course_id}"))
        })
    }

    /// Last computed graph summary for a course.
    pub async fn get_graph_stats(&self, course_id: &str) -> Result<Option<GraphStats>> {
        let mut rows = self
            .conn
            .query(
                "SELECT course_id, total_units, total_relations, graph_depth, updated_at
                 FROM graph_stats WHERE course_id = ?1",
                params![course_id],
            )
            .await
            .map_err(CourseGraphError::persistence)?;

        match rows.next().await.map_err(CourseGraphError::persistence)? {
            Some(row) => Ok(Some(GraphStats {
                course_id: text(&row, 0)?,
                total_units: integer(&row, 1)? as u64,
                total_relations: integer(&row, 2)? as u64,
                graph_depth: integer(&row, 3)? as u32,
                updated_at: timestamp(&row, 4)?,
            })),
            None => Ok(None),
        }
    }
}

/// Connect and set the busy timeout.
async fn connect(db: &Database) -> Result<Connection> {
    let conn = db.connect().map_err(CourseGraphError::persistence)?;
    conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), params![])
        .await
        .map_err(CourseGraphError::persistence)?;
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Row writers shared by single and batch operations
// ---------------------------------------------------------------------------

async fn insert_unit_row(conn: &Connection, unit: &KnowledgeUnit) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO knowledge_units ({UNIT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            unit.id.as_str(),
            unit.course_id.as_str(),
            unit.document_id.as_deref(),
            unit.name.as_str(),
            unit.content.as_str(),
            unit.full_content.as_deref(),
            unit.unit_type.as_str(),
            i64::from(unit.level),
            unit.parent_id.as_deref(),
            encode_json(&unit.keywords)?,
            i64::from(unit.importance),
            i64::from(unit.order_index),
            unit.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(CourseGraphError::persistence)?;
    Ok(())
}

async fn upsert_search_row(conn: &Connection, entry: &SearchIndexEntry) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO search_index ({SEARCH_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(document_id, chunk_index) DO UPDATE SET
               id = excluded.id,
               course_id = excluded.course_id,
               unit_id = excluded.unit_id,
               document_type = excluded.document_type,
               chunk_text = excluded.chunk_text,
               metadata_json = excluded.metadata_json"
        ),
        params![
            entry.id.as_str(),
            entry.document_id.as_str(),
            entry.course_id.as_str(),
            entry.unit_id.as_str(),
            entry.document_type.as_str(),
            entry.chunk_text.as_str(),
            i64::from(entry.chunk_index),
            encode_json(&entry.metadata)?,
        ],
    )
    .await
    .map_err(CourseGraphError::persistence)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row readers
// ---------------------------------------------------------------------------

/// Convert a database row to a [`Document`].
fn row_to_document(row: &Row) -> Result<Document> {
    Ok(Document {
        id: text(row, 0)?,
        course_id: text(row, 1)?,
        file_name: text(row, 2)?,
        file_path: text(row, 3)?,
        file_type: text(row, 4)?,
        document_type: text(row, 5)?.parse::<DocumentType>()?,
        processed_status: text(row, 6)?.parse()?,
        processing_progress: integer(row, 7)? as u32,
        extracted_text: row.get::<String>(8).ok(),
        content_hash: row.get::<String>(9).ok(),
        error_message: row.get::<String>(10).ok(),
        created_at: timestamp(row, 11)?,
        updated_at: timestamp(row, 12)?,
    })
}

/// Convert a database row to a [`ProcessingTask`].
fn row_to_task(row: &Row) -> Result<ProcessingTask> {
    let result = match row.get::<String>(7).ok() {
        Some(json) => Some(decode_json::<ResultSummary>(&json)?),
        None => None,
    };

    Ok(ProcessingTask {
        id: text(row, 0)?,
        document_id: text(row, 1)?,
        task_type: text(row, 2)?,
        status: text(row, 3)?.parse()?,
        progress: integer(row, 4)? as u32,
        current_step: integer(row, 5)? as u32,
        total_steps: integer(row, 6)? as u32,
        result,
        error_message: row.get::<String>(8).ok(),
        started_at: optional_timestamp(row, 9)?,
        completed_at: optional_timestamp(row, 10)?,
        updated_at: timestamp(row, 11)?,
    })
}

/// Convert a database row to a [`KnowledgeUnit`].
fn row_to_unit(row: &Row) -> Result<KnowledgeUnit> {
    let keywords = text(row, 9)?;
    Ok(KnowledgeUnit {
        id: text(row, 0)?,
        course_id: text(row, 1)?,
        document_id: row.get::<String>(2).ok(),
        name: text(row, 3)?,
        content: text(row, 4)?,
        full_content: row.get::<String>(5).ok(),
        unit_type: text(row, 6)?.parse()?,
        level: integer(row, 7)? as u32,
        parent_id: row.get::<String>(8).ok(),
        keywords: decode_json(&keywords)?,
        importance: integer(row, 10)? as u32,
        order_index: integer(row, 11)? as u32,
        created_at: timestamp(row, 12)?,
    })
}

fn text(row: &Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(CourseGraphError::persistence)
}

fn integer(row: &Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx).map_err(CourseGraphError::persistence)
}

fn timestamp(row: &Row, idx: i32) -> Result<DateTime<Utc>> {
    parse_timestamp(&text(row, idx)?)
}

fn optional_timestamp(row: &Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    row.get::<String>(idx)
        .ok()
        .map(|s| parse_timestamp(&s))
        .transpose()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CourseGraphError::persistence(format!("invalid date: {e}")))
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(CourseGraphError::persistence)
}

fn decode_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(CourseGraphError::persistence)
}

fn ensure_found(changed: u64, what: &str, id: &str) -> Result<()> {
    if changed == 0 {
        return Err(CourseGraphError::validation(format!("{what} not found: {id}")));
    }
    Ok(())
}
