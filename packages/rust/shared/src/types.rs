//! Core domain types for CourseGraph: documents, tasks, knowledge units, relations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CourseGraphError;

/// Number of checkpointed steps in one processing run.
pub const TASK_TOTAL_STEPS: u32 = 6;

/// Task type recorded for knowledge-extraction runs.
pub const TASK_TYPE_KNOWLEDGE_EXTRACTION: &str = "knowledge_extraction";

/// Relation type written by the graph builder.
pub const RELATION_TYPE_RELATED: &str = "related";

/// Generate a new time-sortable identifier (UUID v7).
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Lifecycle status shared by processing tasks and documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = CourseGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CourseGraphError::validation(format!(
                "unknown processing status '{other}'"
            ))),
        }
    }
}

/// Kind of knowledge unit extracted from a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Chapter,
    Section,
    Definition,
    Point,
    Example,
}

impl UnitType {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chapter => "chapter",
            Self::Section => "section",
            Self::Definition => "definition",
            Self::Point => "point",
            Self::Example => "example",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitType {
    type Err = CourseGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "chapter" => Ok(Self::Chapter),
            "section" => Ok(Self::Section),
            "definition" => Ok(Self::Definition),
            "point" => Ok(Self::Point),
            "example" => Ok(Self::Example),
            other => Err(CourseGraphError::validation(format!(
                "unknown unit type '{other}'"
            ))),
        }
    }
}

/// Classification of an uploaded course document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Course outline / syllabus.
    Outline,
    /// Teaching material (the default).
    #[default]
    Material,
}

impl DocumentType {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::Material => "material",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = CourseGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "outline" => Ok(Self::Outline),
            "material" => Ok(Self::Material),
            other => Err(CourseGraphError::validation(format!(
                "unknown document type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An uploaded course document, as tracked in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: String,
    /// Owning course.
    pub course_id: String,
    /// Original file name.
    pub file_name: String,
    /// Path of the uploaded file on disk.
    pub file_path: String,
    /// Declared file type (extension, e.g. `pdf`).
    pub file_type: String,
    /// Outline or material.
    pub document_type: DocumentType,
    /// Processing lifecycle status.
    pub processed_status: ProcessingStatus,
    /// Mirror of the latest task progress checkpoint (0–100).
    pub processing_progress: u32,
    /// Text produced by the extractor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    /// SHA-256 of the extracted text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Failure message mirrored from the last failed task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ProcessingTask
// ---------------------------------------------------------------------------

/// Summary recorded on a completed task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Knowledge units persisted.
    pub total_points: usize,
    /// Top-level sections found by the segmenter.
    pub sections: usize,
    /// Extracted text length in characters.
    pub text_length: usize,
}

/// A tracked pipeline run with progress and terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub id: String,
    pub document_id: String,
    pub task_type: String,
    pub status: ProcessingStatus,
    /// 0–100.
    pub progress: u32,
    pub current_step: u32,
    pub total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// KnowledgeUnit / KnowledgeRelation
// ---------------------------------------------------------------------------

/// A persisted node of the knowledge hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeUnit {
    pub id: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub name: String,
    /// Bounded summary content.
    pub content: String,
    /// Unbounded section text, kept for chapter units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    pub unit_type: UnitType,
    /// 1 (chapter) to 3 (point/example).
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Ranked keywords, most frequent first.
    pub keywords: Vec<String>,
    /// 1–5.
    pub importance: u32,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
}

/// A weighted link between two units sharing vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRelation {
    pub id: String,
    pub course_id: String,
    pub source_unit_id: String,
    pub target_unit_id: String,
    pub relation_type: String,
    /// 0.0–1.0.
    pub strength: f64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Search index
// ---------------------------------------------------------------------------

/// Metadata mirror stored alongside a search index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub unit_name: String,
    pub unit_type: UnitType,
    pub level: u32,
    pub keywords: Vec<String>,
    pub document_type: DocumentType,
}

/// Denormalized copy of a unit for similarity search. Not authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub id: String,
    pub document_id: String,
    pub course_id: String,
    pub unit_id: String,
    pub document_type: DocumentType,
    pub chunk_text: String,
    /// Write position of the unit within its run; unique per document.
    pub chunk_index: u32,
    pub metadata: SearchMetadata,
}

// ---------------------------------------------------------------------------
// Graph statistics & progress polling
// ---------------------------------------------------------------------------

/// Course-level graph statistics, recomputed after edge writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub course_id: String,
    pub total_units: u64,
    pub total_relations: u64,
    /// Deepest unit level in the course.
    pub graph_depth: u32,
    pub updated_at: DateTime<Utc>,
}

/// Progress polling surface for a document's latest task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub document_id: String,
    pub task_id: String,
    pub status: ProcessingStatus,
    pub progress: u32,
    pub current_step: u32,
    pub total_steps: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_summary: Option<ResultSummary>,
}

impl From<ProcessingTask> for ProgressReport {
    fn from(task: ProcessingTask) -> Self {
        Self {
            document_id: task.document_id,
            task_id: task.id,
            status: task.status,
            progress: task.progress,
            current_step: task.current_step,
            total_steps: task.total_steps,
            started_at: task.started_at,
            completed_at: task.completed_at,
            error_message: task.error_message,
            result_summary: task.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            let parsed: ProcessingStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!("done".parse::<ProcessingStatus>().is_err());
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::Processing.is_terminal());
    }

    #[test]
    fn unit_type_serializes_lowercase() {
        let json = serde_json::to_string(&UnitType::Definition).expect("serialize");
        assert_eq!(json, "\"definition\"");
        let parsed: UnitType = "example".parse().expect("parse");
        assert_eq!(parsed, UnitType::Example);
    }

    #[test]
    fn document_type_defaults_to_material() {
        assert_eq!(DocumentType::default(), DocumentType::Material);
    }

    #[test]
    fn progress_report_from_task() {
        let task = ProcessingTask {
            id: new_id(),
            document_id: "doc-1".into(),
            task_type: TASK_TYPE_KNOWLEDGE_EXTRACTION.into(),
            status: ProcessingStatus::Completed,
            progress: 100,
            current_step: 6,
            total_steps: TASK_TOTAL_STEPS,
            result: Some(ResultSummary {
                total_points: 5,
                sections: 1,
                text_length: 64,
            }),
            error_message: None,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            updated_at: Utc::now(),
        };

        let report = ProgressReport::from(task);
        assert_eq!(report.document_id, "doc-1");
        assert_eq!(report.total_steps, 6);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result_summary"]["total_points"], 5);
    }
}
