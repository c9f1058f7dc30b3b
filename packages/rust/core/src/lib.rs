//! Core pipeline orchestration and domain logic for CourseGraph.
//!
//! This crate ties together text extraction, segmentation, persistence, and
//! graph building into the per-document ingestion run driven by
//! [`pipeline::Orchestrator`].

pub mod graph;
pub mod pipeline;
pub mod writer;

pub use pipeline::{
    IngestOutcome, IngestRequest, Orchestrator, ProgressReporter, SilentProgress, TaskHandle,
};
