//! Shared types, error model, and configuration for CourseGraph.
//!
//! This crate is the foundation depended on by all other CourseGraph crates.
//! It provides:
//! - [`CourseGraphError`] — the unified error type
//! - Domain types ([`Document`], [`ProcessingTask`], [`KnowledgeUnit`], [`KnowledgeRelation`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - Character-counted string helpers ([`text`])

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractionConfig, KeywordsConfig, PersistenceConfig, PipelineConfig, PointsConfig,
    SegmentationConfig, StorageConfig, config_dir, config_file_path, expand_home, init_config,
    load_config, load_config_from,
};
pub use error::{CourseGraphError, Result};
pub use types::{
    Document, DocumentType, GraphStats, KnowledgeRelation, KnowledgeUnit, ProcessingStatus,
    ProcessingTask, ProgressReport, RELATION_TYPE_RELATED, ResultSummary, SearchIndexEntry,
    SearchMetadata, TASK_TOTAL_STEPS, TASK_TYPE_KNOWLEDGE_EXTRACTION, UnitType, new_id,
};
