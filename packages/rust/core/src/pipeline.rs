//! Ingestion pipeline: document → text → sections → drafts → units → graph.
//!
//! One run per document moves a [`ProcessingTask`] through six steps with
//! fixed progress checkpoints. The orchestrator is the only place stage
//! errors are caught: the error text is recorded on the task and the
//! document, both are marked failed, and nothing already written is undone.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use coursegraph_segment::{extract_keywords, extract_points, segment};
use coursegraph_shared::text::char_len;
use coursegraph_shared::{
    CourseGraphError, PipelineConfig, ProcessingStatus, ProcessingTask, Result, ResultSummary,
    TASK_TOTAL_STEPS, TASK_TYPE_KNOWLEDGE_EXTRACTION, new_id,
};
use coursegraph_storage::Storage;

use crate::graph;
use crate::writer::{self, DraftArena};

/// Progress recorded right after the extracted text is stored.
const EXTRACTED_PROGRESS: u32 = 20;

/// A request to ingest one uploaded document.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub document_id: String,
    pub course_id: String,
    pub file_path: PathBuf,
    /// Declared extension, with or without the leading dot.
    pub file_type: String,
}

/// What the caller gets back when a run is started.
#[derive(Debug, Clone, Serialize)]
pub struct TaskHandle {
    pub task_id: String,
    pub status: ProcessingStatus,
    pub progress: u32,
}

/// Terminal state of one run.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub task_id: String,
    pub document_id: String,
    pub status: ProcessingStatus,
    pub summary: Option<ResultSummary>,
    pub relations: usize,
    pub error_message: Option<String>,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn phase(&self, name: &str);
    /// Called after each recorded checkpoint.
    fn checkpoint(&self, progress: u32, step: u32);
    /// Called once the run reaches a terminal state.
    fn done(&self, outcome: &IngestOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn checkpoint(&self, _progress: u32, _step: u32) {}
    fn done(&self, _outcome: &IngestOutcome) {}
}

/// Drives ingestion runs against one database.
#[derive(Clone)]
pub struct Orchestrator {
    storage: Arc<Storage>,
    config: Arc<PipelineConfig>,
}

impl Orchestrator {
    pub fn new(storage: Arc<Storage>, config: PipelineConfig) -> Self {
        Self {
            storage,
            config: Arc::new(config),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Create the task and drive the run on a background tokio task.
    pub async fn start(
        &self,
        request: IngestRequest,
        cancel: CancellationToken,
    ) -> Result<(TaskHandle, JoinHandle<IngestOutcome>)> {
        let task = self.create_task(&request.document_id).await?;
        let handle = TaskHandle {
            task_id: task.id.clone(),
            status: task.status,
            progress: task.progress,
        };

        let this = self.clone();
        let join = tokio::spawn(async move {
            this.drive(&task.id, &request, &cancel, &SilentProgress)
                .await
        });

        Ok((handle, join))
    }

    /// Create the task and drive the run to completion on the current task.
    ///
    /// Only task creation errors are returned; stage errors end up in the
    /// outcome.
    pub async fn run(
        &self,
        request: &IngestRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestOutcome> {
        let task = self.create_task(&request.document_id).await?;
        Ok(self.drive(&task.id, request, cancel, progress).await)
    }

    /// Record a checkpoint on a task. Monotonic progress is up to the caller.
    pub async fn advance(
        &self,
        task_id: &str,
        progress: u32,
        step: u32,
        status: ProcessingStatus,
    ) -> Result<()> {
        self.storage
            .advance_task(task_id, progress, step, status)
            .await
    }

    async fn create_task(&self, document_id: &str) -> Result<ProcessingTask> {
        let now = Utc::now();
        let task = ProcessingTask {
            id: new_id(),
            document_id: document_id.to_string(),
            task_type: TASK_TYPE_KNOWLEDGE_EXTRACTION.to_string(),
            status: ProcessingStatus::Processing,
            progress: 0,
            current_step: 0,
            total_steps: TASK_TOTAL_STEPS,
            result: None,
            error_message: None,
            started_at: Some(now),
            completed_at: None,
            updated_at: now,
        };
        self.storage.insert_task(&task).await?;
        Ok(task)
    }

    #[instrument(skip_all, fields(task_id = %task_id, document_id = %request.document_id))]
    async fn drive(
        &self,
        task_id: &str,
        request: &IngestRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> IngestOutcome {
        let start = Instant::now();
        info!(path = %request.file_path.display(), "starting ingestion");

        let outcome = match self.execute(task_id, request, cancel, progress).await {
            Ok((summary, relations)) => {
                info!(
                    total_points = summary.total_points,
                    sections = summary.sections,
                    relations,
                    elapsed_ms = start.elapsed().as_millis(),
                    "ingestion complete"
                );
                IngestOutcome {
                    task_id: task_id.to_string(),
                    document_id: request.document_id.clone(),
                    status: ProcessingStatus::Completed,
                    summary: Some(summary),
                    relations,
                    error_message: None,
                    elapsed: start.elapsed(),
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "ingestion failed");
                self.record_failure(task_id, &request.document_id, &message)
                    .await;
                IngestOutcome {
                    task_id: task_id.to_string(),
                    document_id: request.document_id.clone(),
                    status: ProcessingStatus::Failed,
                    summary: None,
                    relations: 0,
                    error_message: Some(message),
                    elapsed: start.elapsed(),
                }
            }
        };

        progress.done(&outcome);
        outcome
    }

    /// Every stage in order. Any error aborts the run.
    async fn execute(
        &self,
        task_id: &str,
        request: &IngestRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<(ResultSummary, usize)> {
        let config = &self.config;

        // --- Step 1: Extract text ---
        self.checkpoint(task_id, 5, 1, progress).await?;
        ensure_active(cancel)?;
        progress.phase("Extracting text");

        let text = extract_blocking(request, config).await?;
        let hash = content_hash(&text);
        let recorded = self
            .storage
            .record_extraction(&request.document_id, &text, &hash, EXTRACTED_PROGRESS)
            .await?;
        if !recorded {
            warn!("document row not found, extracted text not stored");
        }
        self.checkpoint(task_id, EXTRACTED_PROGRESS, 1, progress)
            .await?;
        ensure_active(cancel)?;

        // --- Step 2: Segment ---
        progress.phase("Segmenting sections");
        let sections = segment(&text, &config.segmentation);
        info!(sections = sections.len(), chars = char_len(&text), "text segmented");
        self.checkpoint(task_id, 30, 2, progress).await?;

        // --- Step 3: Extract points per section ---
        progress.phase("Extracting knowledge points");
        let mut arena = DraftArena::new();
        let total = sections.len();
        for (i, section) in sections.iter().enumerate() {
            ensure_active(cancel)?;
            arena.push_section(extract_points(section, i + 1, &config.points));
            let pct = 30 + ((i + 1) * 40 / total) as u32;
            self.checkpoint(task_id, pct, 3, progress).await?;
        }
        ensure_active(cancel)?;

        // --- Step 4: Keywords ---
        progress.phase("Summarizing keywords");
        for draft in arena.iter_mut() {
            draft.keywords = extract_keywords(&draft.content, &config.keywords);
        }
        self.checkpoint(task_id, 80, 4, progress).await?;
        ensure_active(cancel)?;

        // --- Step 5: Persist ---
        progress.phase("Persisting knowledge units");
        let units = writer::persist_units(
            &self.storage,
            &arena,
            &request.course_id,
            &request.document_id,
            &config.persistence,
        )
        .await?;
        self.checkpoint(task_id, 90, 5, progress).await?;
        ensure_active(cancel)?;

        // --- Step 6: Graph and completion ---
        progress.phase("Building knowledge graph");
        let graph = graph::build_graph(&self.storage, &units, &request.course_id).await?;

        let summary = ResultSummary {
            total_points: arena.len(),
            sections: total,
            text_length: char_len(&text),
        };
        self.storage.complete_task(task_id, &summary).await?;
        let completed = self.storage.complete_document(&request.document_id).await?;
        if !completed {
            warn!("document row not found, completion not recorded");
        }
        progress.checkpoint(100, TASK_TOTAL_STEPS);

        Ok((summary, graph.relations))
    }

    async fn checkpoint(
        &self,
        task_id: &str,
        pct: u32,
        step: u32,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        self.advance(task_id, pct, step, ProcessingStatus::Processing)
            .await?;
        progress.checkpoint(pct, step);
        Ok(())
    }

    /// Mark task and document failed. Bookkeeping errors are logged only.
    async fn record_failure(&self, task_id: &str, document_id: &str, message: &str) {
        if let Err(e) = self.storage.fail_task(task_id, message).await {
            error!(error = %e, "could not mark task failed");
        }
        match self.storage.fail_document(document_id, message).await {
            Ok(true) => {}
            Ok(false) => warn!("document row not found, failure not recorded"),
            Err(e) => error!(error = %e, "could not mark document failed"),
        }
    }
}

/// Run the blocking extractor off the async runtime.
async fn extract_blocking(request: &IngestRequest, config: &PipelineConfig) -> Result<String> {
    let path = request.file_path.clone();
    let file_type = request.file_type.clone();
    let extraction = config.extraction.clone();

    tokio::task::spawn_blocking(move || coursegraph_extract::extract(&path, &file_type, &extraction))
        .await
        .map_err(|e| {
            CourseGraphError::extraction(&request.file_path, format!("extraction task failed: {e}"))
        })?
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(CourseGraphError::Cancelled);
    }
    Ok(())
}

/// SHA-256 of the extracted text, hex encoded.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use coursegraph_shared::{Document, DocumentType};

    const COURSE_INTRO: &str = "第一章 导论\n计算机科学是指对计算和信息处理的系统性研究。\n• 算法\n• 数据结构\n示例1：排序算法的时间复杂度分析。";

    async fn orchestrator() -> Orchestrator {
        let tmp = std::env::temp_dir().join(format!("cg_pipeline_{}.db", new_id()));
        let storage = Storage::open(&tmp).await.expect("open db");
        Orchestrator::new(Arc::new(storage), PipelineConfig::default())
    }

    async fn register(orch: &Orchestrator, content: &str, ext: &str) -> IngestRequest {
        let path = std::env::temp_dir().join(format!("cg_pipeline_{}.{ext}", new_id()));
        std::fs::write(&path, content).unwrap();

        let now = Utc::now();
        let doc = Document {
            id: new_id(),
            course_id: "course-1".into(),
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            file_path: path.display().to_string(),
            file_type: format!(".{ext}"),
            document_type: DocumentType::Material,
            processed_status: ProcessingStatus::Pending,
            processing_progress: 0,
            extracted_text: None,
            content_hash: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        orch.storage().insert_document(&doc).await.unwrap();

        IngestRequest {
            document_id: doc.id,
            course_id: doc.course_id,
            file_path: path,
            file_type: format!(".{ext}"),
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        checkpoints: Mutex<Vec<(u32, u32)>>,
        done: Mutex<Option<ProcessingStatus>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn checkpoint(&self, progress: u32, step: u32) {
            self.checkpoints.lock().unwrap().push((progress, step));
        }
        fn done(&self, outcome: &IngestOutcome) {
            *self.done.lock().unwrap() = Some(outcome.status);
        }
    }

    #[tokio::test]
    async fn course_intro_end_to_end() {
        let orch = orchestrator().await;
        let request = register(&orch, COURSE_INTRO, "txt").await;
        let progress = RecordingProgress::default();

        let outcome = orch
            .run(&request, &CancellationToken::new(), &progress)
            .await
            .expect("run");

        assert_eq!(outcome.status, ProcessingStatus::Completed, "{:?}", outcome.error_message);
        let summary = outcome.summary.expect("summary");
        assert_eq!(summary.total_points, 5);
        assert_eq!(summary.sections, 1);
        assert_eq!(summary.text_length, char_len(COURSE_INTRO));
        // Chapter links to both points and the example.
        assert_eq!(outcome.relations, 3);

        assert_eq!(
            *progress.checkpoints.lock().unwrap(),
            vec![(5, 1), (20, 1), (30, 2), (70, 3), (80, 4), (90, 5), (100, 6)]
        );
        assert_eq!(*progress.done.lock().unwrap(), Some(ProcessingStatus::Completed));

        let storage = orch.storage();
        let units = storage.list_units_by_document(&request.document_id).await.unwrap();
        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["导论", "计算机科学", "算法", "数据结构", "示例1"]);
        assert!(units[1..].iter().all(|u| u.parent_id.as_deref() == Some(units[0].id.as_str())));

        let report = storage
            .progress_report(&request.document_id)
            .await
            .unwrap()
            .expect("report");
        assert_eq!(report.status, ProcessingStatus::Completed);
        assert_eq!((report.progress, report.current_step, report.total_steps), (100, 6, 6));
        assert_eq!(report.result_summary, Some(summary));

        let doc = storage.get_document(&request.document_id).await.unwrap().unwrap();
        assert_eq!(doc.processed_status, ProcessingStatus::Completed);
        assert_eq!(doc.processing_progress, 100);
        assert_eq!(doc.extracted_text.as_deref(), Some(COURSE_INTRO));
        assert_eq!(doc.content_hash.map(|h| h.len()), Some(64));

        let stats = storage.get_graph_stats("course-1").await.unwrap().expect("stats");
        assert_eq!((stats.total_units, stats.total_relations, stats.graph_depth), (5, 3, 3));
    }

    #[tokio::test]
    async fn unsupported_type_fails_task_and_document() {
        let orch = orchestrator().await;
        let request = register(&orch, "slides", "pptx").await;

        let outcome = orch
            .run(&request, &CancellationToken::new(), &SilentProgress)
            .await
            .expect("run");
        assert_eq!(outcome.status, ProcessingStatus::Failed);
        assert_eq!(outcome.error_message.as_deref(), Some("unsupported file type: .pptx"));

        let storage = orch.storage();
        let task = storage.get_task(&outcome.task_id).await.unwrap().unwrap();
        assert_eq!(task.status, ProcessingStatus::Failed);
        assert_eq!(task.progress, 5);
        assert_eq!(task.error_message.as_deref(), Some("unsupported file type: .pptx"));
        assert!(task.completed_at.is_some());

        let doc = storage.get_document(&request.document_id).await.unwrap().unwrap();
        assert_eq!(doc.processed_status, ProcessingStatus::Failed);
        assert_eq!(doc.error_message.as_deref(), Some("unsupported file type: .pptx"));
    }

    #[tokio::test]
    async fn missing_file_is_extraction_failure() {
        let orch = orchestrator().await;
        let mut request = register(&orch, "x", "pdf").await;
        request.file_path = std::env::temp_dir().join(format!("cg_gone_{}.pdf", new_id()));

        let outcome = orch
            .run(&request, &CancellationToken::new(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Failed);
        assert!(
            outcome
                .error_message
                .as_deref()
                .is_some_and(|m| m.starts_with("text extraction failed"))
        );
    }

    #[tokio::test]
    async fn cancelled_run_fails_without_units() {
        let orch = orchestrator().await;
        let request = register(&orch, COURSE_INTRO, "md").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orch.run(&request, &cancel, &SilentProgress).await.unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Failed);
        assert_eq!(outcome.error_message.as_deref(), Some("processing cancelled"));

        let storage = orch.storage();
        assert!(storage.list_units_by_document(&request.document_id).await.unwrap().is_empty());
        let task = storage.get_task(&outcome.task_id).await.unwrap().unwrap();
        assert_eq!((task.status, task.progress), (ProcessingStatus::Failed, 5));
    }

    #[tokio::test]
    async fn empty_document_completes_with_nothing() {
        let orch = orchestrator().await;
        let request = register(&orch, "", "txt").await;

        let outcome = orch
            .run(&request, &CancellationToken::new(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Completed);
        assert_eq!(outcome.summary, Some(ResultSummary::default()));
        assert_eq!(outcome.relations, 0);
    }

    #[tokio::test]
    async fn start_runs_in_background() {
        let orch = orchestrator().await;
        let request = register(&orch, COURSE_INTRO, "txt").await;

        let (handle, join) = orch
            .start(request.clone(), CancellationToken::new())
            .await
            .expect("start");
        assert_eq!(handle.status, ProcessingStatus::Processing);
        assert_eq!(handle.progress, 0);

        let outcome = join.await.expect("join");
        assert_eq!(outcome.task_id, handle.task_id);
        assert_eq!(outcome.status, ProcessingStatus::Completed);

        let report = orch
            .storage()
            .progress_report(&request.document_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.progress, 100);
    }

    #[tokio::test]
    async fn runs_without_document_row_use_material_defaults() {
        let orch = orchestrator().await;
        let path = std::env::temp_dir().join(format!("cg_pipeline_{}.txt", new_id()));
        std::fs::write(&path, COURSE_INTRO).unwrap();
        let request = IngestRequest {
            document_id: new_id(),
            course_id: "course-2".into(),
            file_path: path,
            file_type: "txt".into(),
        };

        let outcome = orch
            .run(&request, &CancellationToken::new(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Completed);

        let entries = orch.storage().list_search_entries(&request.document_id).await.unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| e.document_type == DocumentType::Material));
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_runs_on_different_documents_all_complete() {
        let orch = orchestrator().await;

        let mut content = String::new();
        for chapter in 1..=40 {
            content.push_str(&format!("第{chapter}章 主题{chapter}\n"));
            for item in 1..=30 {
                content.push_str(&format!("• 要点内容{chapter}条目{item}\n"));
            }
        }

        let mut requests = Vec::new();
        for _ in 0..4 {
            requests.push(register(&orch, &content, "txt").await);
        }

        let mut joins = Vec::new();
        for request in &requests {
            let (_, join) = orch
                .start(request.clone(), CancellationToken::new())
                .await
                .expect("start");
            joins.push(join);
        }

        for (request, join) in requests.iter().zip(joins) {
            let outcome = join.await.expect("join");
            assert_eq!(
                outcome.status,
                ProcessingStatus::Completed,
                "{:?}",
                outcome.error_message
            );
            let summary = outcome.summary.expect("summary");
            assert_eq!(summary.sections, 40);

            let units = orch
                .storage()
                .list_units_by_document(&request.document_id)
                .await
                .unwrap();
            assert_eq!(units.len(), summary.total_points);
        }
    }
}
