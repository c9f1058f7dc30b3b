//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use coursegraph_core::{IngestOutcome, IngestRequest, Orchestrator, ProgressReporter};
use coursegraph_shared::{
    AppConfig, Document, DocumentType, PipelineConfig, ProcessingStatus, TASK_TOTAL_STEPS,
    expand_home, init_config, load_config, new_id,
};
use coursegraph_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CourseGraph: turn course documents into a knowledge graph.
#[derive(Parser)]
#[command(
    name = "coursegraph",
    version,
    about = "Ingest course documents into knowledge units and a keyword graph.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file, overriding `storage.database_path` from the config.
    #[arg(long, global = true, env = "COURSEGRAPH_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Document classification as accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum Kind {
    Outline,
    Material,
}

impl From<Kind> for DocumentType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Outline => DocumentType::Outline,
            Kind::Material => DocumentType::Material,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest a course document and build its knowledge units.
    Ingest {
        /// Path to the document (pdf, docx, doc, txt, md).
        file: PathBuf,

        /// Owning course id.
        #[arg(short, long)]
        course: String,

        /// Existing document id. A new document is registered when omitted.
        #[arg(short, long)]
        document: Option<String>,

        /// Declared file type (defaults to the file extension).
        #[arg(short = 't', long = "type")]
        file_type: Option<String>,

        /// Document classification.
        #[arg(short, long, value_enum, default_value = "material")]
        kind: Kind,
    },

    /// Print the progress report of a document's latest run as JSON.
    Status {
        /// Document id.
        #[arg(short, long)]
        document: String,
    },

    /// List the knowledge units stored for a document.
    Units {
        /// Document id.
        #[arg(short, long)]
        document: String,
    },

    /// Show graph statistics for a course.
    Graph {
        /// Course id.
        #[arg(short, long)]
        course: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coursegraph=info",
        1 => "coursegraph=debug",
        _ => "coursegraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Ingest {
            file,
            course,
            document,
            file_type,
            kind,
        } => {
            cmd_ingest(
                db.as_deref(),
                &file,
                &course,
                document,
                file_type,
                kind.into(),
            )
            .await
        }
        Command::Status { document } => cmd_status(db.as_deref(), &document).await,
        Command::Units { document } => cmd_units(db.as_deref(), &document).await,
        Command::Graph { course } => cmd_graph(db.as_deref(), &course).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Database path from the `--db` override or the loaded config.
fn database_path(db: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(expand_home(&config.storage.database_path)?),
    }
}

async fn open_readonly(db: Option<&Path>) -> Result<Storage> {
    let config = load_config()?;
    let path = database_path(db, &config)?;
    Ok(Storage::open_readonly(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    db: Option<&Path>,
    file: &Path,
    course_id: &str,
    document_id: Option<String>,
    file_type: Option<String>,
    kind: DocumentType,
) -> Result<()> {
    let config = load_config()?;
    let db_path = database_path(db, &config)?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| eyre!("cannot create database directory {}: {e}", parent.display()))?;
    }
    let storage = Arc::new(Storage::open(&db_path).await?);

    let file_type = match file_type {
        Some(t) => t,
        None => file
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .ok_or_else(|| {
                eyre!(
                    "cannot infer file type of '{}': pass --type",
                    file.display()
                )
            })?,
    };

    let document_id = match document_id {
        Some(id) => {
            if storage.get_document(&id).await?.is_none() {
                warn!(document_id = %id, "document not registered; status updates will be skipped");
            }
            id
        }
        None => register_document(&storage, file, course_id, &file_type, kind).await?,
    };

    info!(
        file = %file.display(),
        course_id,
        document_id = %document_id,
        %file_type,
        "ingesting document"
    );

    let request = IngestRequest {
        document_id: document_id.clone(),
        course_id: course_id.to_string(),
        file_path: file.to_path_buf(),
        file_type,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let orchestrator = Orchestrator::new(storage, PipelineConfig::from(&config));
    let reporter = CliProgress::new();
    let outcome = orchestrator.run(&request, &cancel, &reporter).await?;

    println!();
    match outcome.status {
        ProcessingStatus::Completed => {
            let summary = outcome.summary.unwrap_or_default();
            println!("  Document ingested successfully!");
            println!("  Document:  {}", outcome.document_id);
            println!("  Task:      {}", outcome.task_id);
            println!("  Sections:  {}", summary.sections);
            println!("  Units:     {}", summary.total_points);
            println!("  Relations: {}", outcome.relations);
            println!("  Text:      {} chars", summary.text_length);
            println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());
            println!();
            Ok(())
        }
        _ => {
            println!("  Ingestion failed.");
            println!("  Document:  {}", outcome.document_id);
            println!("  Task:      {}", outcome.task_id);
            println!();
            Err(eyre!(
                "ingestion failed: {}",
                outcome.error_message.as_deref().unwrap_or("unknown error")
            ))
        }
    }
}

async fn register_document(
    storage: &Storage,
    file: &Path,
    course_id: &str,
    file_type: &str,
    kind: DocumentType,
) -> Result<String> {
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let file_path = std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());

    let now = Utc::now();
    let document = Document {
        id: new_id(),
        course_id: course_id.to_string(),
        file_name,
        file_path: file_path.to_string_lossy().into_owned(),
        file_type: file_type.trim_start_matches('.').to_ascii_lowercase(),
        document_type: kind,
        processed_status: ProcessingStatus::Pending,
        processing_progress: 0,
        extracted_text: None,
        content_hash: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    };
    storage.insert_document(&document).await?;
    info!(document_id = %document.id, document_type = %kind, "document registered");

    Ok(document.id)
}

async fn cmd_status(db: Option<&Path>, document_id: &str) -> Result<()> {
    let storage = open_readonly(db).await?;
    let report = storage
        .progress_report(document_id)
        .await?
        .ok_or_else(|| eyre!("no processing task found for document '{document_id}'"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_units(db: Option<&Path>, document_id: &str) -> Result<()> {
    let storage = open_readonly(db).await?;
    let units = storage.list_units_by_document(document_id).await?;
    if units.is_empty() {
        println!("no knowledge units stored for document '{document_id}'");
        return Ok(());
    }

    for unit in &units {
        let indent = "  ".repeat(unit.level.saturating_sub(1) as usize);
        println!(
            "{indent}[{}] {} (importance {})",
            unit.unit_type, unit.name, unit.importance
        );
        if !unit.keywords.is_empty() {
            println!("{indent}    keywords: {}", unit.keywords.join(", "));
        }
    }
    println!();
    println!("{} units", units.len());
    Ok(())
}

async fn cmd_graph(db: Option<&Path>, course_id: &str) -> Result<()> {
    let storage = open_readonly(db).await?;
    let relations = storage.list_relations_by_course(course_id).await?;

    match storage.get_graph_stats(course_id).await? {
        Some(stats) => {
            println!("  Course:    {}", stats.course_id);
            println!("  Units:     {}", stats.total_units);
            println!("  Relations: {}", stats.total_relations);
            println!("  Depth:     {}", stats.graph_depth);
            println!("  Updated:   {}", stats.updated_at.to_rfc3339());
        }
        None => println!("no graph statistics recorded for course '{course_id}'"),
    }

    if let Some(strongest) = relations
        .iter()
        .max_by(|a, b| a.strength.total_cmp(&b.strength))
    {
        println!(
            "  Strongest: {:.2} ({})",
            strongest.strength, strongest.description
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn checkpoint(&self, progress: u32, step: u32) {
        self.spinner
            .set_prefix(format!("[{progress:>3}%] {step}/{TASK_TOTAL_STEPS}"));
    }

    fn done(&self, _outcome: &IngestOutcome) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
