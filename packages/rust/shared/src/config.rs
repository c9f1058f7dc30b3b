//! Application configuration for CourseGraph.
//!
//! User config lives at `~/.coursegraph/coursegraph.toml`.
//! CLI flags override config file values, which override defaults.
//! Every extraction cap is a field here rather than a literal in the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CourseGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coursegraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coursegraph";

// ---------------------------------------------------------------------------
// Config structs (matching coursegraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Text extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Section segmentation thresholds.
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Per-section knowledge-unit caps.
    #[serde(default)]
    pub points: PointsConfig,

    /// Keyword summarizer bounds.
    #[serde(default)]
    pub keywords: KeywordsConfig,

    /// Write-time bounds.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file (`~` is expanded).
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.coursegraph/coursegraph.db".into()
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Encodings tried in order when reading plain-text files (WHATWG labels).
    #[serde(default = "default_text_encodings")]
    pub text_encodings: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            text_encodings: default_text_encodings(),
        }
    }
}

fn default_text_encodings() -> Vec<String> {
    ["utf-8", "gbk", "gb2312", "gb18030"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[segmentation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Maximum characters kept for a marker-derived section title.
    #[serde(default = "default_title_chars")]
    pub title_chars: usize,
    /// Maximum characters kept for a paragraph/line fallback title.
    #[serde(default = "default_fallback_title_chars")]
    pub fallback_title_chars: usize,
    /// Paragraphs must be longer than this to become sections.
    #[serde(default = "default_paragraph_min_chars")]
    pub paragraph_min_chars: usize,
    /// Lines must be longer than this to become sections.
    #[serde(default = "default_line_min_chars")]
    pub line_min_chars: usize,
    /// Cap on line-derived sections.
    #[serde(default = "default_max_line_sections")]
    pub max_line_sections: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            title_chars: default_title_chars(),
            fallback_title_chars: default_fallback_title_chars(),
            paragraph_min_chars: default_paragraph_min_chars(),
            line_min_chars: default_line_min_chars(),
            max_line_sections: default_max_line_sections(),
        }
    }
}

fn default_title_chars() -> usize {
    200
}
fn default_fallback_title_chars() -> usize {
    100
}
fn default_paragraph_min_chars() -> usize {
    50
}
fn default_line_min_chars() -> usize {
    30
}
fn default_max_line_sections() -> usize {
    100
}

/// `[points]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    /// Characters of section text kept as the chapter summary.
    #[serde(default = "default_chapter_summary_chars")]
    pub chapter_summary_chars: usize,
    /// Maximum characters of a subsection name.
    #[serde(default = "default_subsection_name_chars")]
    pub subsection_name_chars: usize,
    /// Maximum characters of a subsection body.
    #[serde(default = "default_subsection_content_chars")]
    pub subsection_content_chars: usize,
    /// Minimum matches before a subsection marker style is accepted.
    #[serde(default = "default_subsection_min_matches")]
    pub subsection_min_matches: usize,
    #[serde(default = "default_term_min_chars")]
    pub term_min_chars: usize,
    #[serde(default = "default_term_max_chars")]
    pub term_max_chars: usize,
    #[serde(default = "default_definition_min_chars")]
    pub definition_min_chars: usize,
    #[serde(default = "default_definition_max_chars")]
    pub definition_max_chars: usize,
    /// Definitions kept per section.
    #[serde(default = "default_max_definitions")]
    pub max_definitions: usize,
    /// Maximum characters of a list-point name.
    #[serde(default = "default_point_name_chars")]
    pub point_name_chars: usize,
    /// List points kept per section.
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    /// Maximum characters of an example body.
    #[serde(default = "default_example_content_chars")]
    pub example_content_chars: usize,
    /// Examples kept per section.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            chapter_summary_chars: default_chapter_summary_chars(),
            subsection_name_chars: default_subsection_name_chars(),
            subsection_content_chars: default_subsection_content_chars(),
            subsection_min_matches: default_subsection_min_matches(),
            term_min_chars: default_term_min_chars(),
            term_max_chars: default_term_max_chars(),
            definition_min_chars: default_definition_min_chars(),
            definition_max_chars: default_definition_max_chars(),
            max_definitions: default_max_definitions(),
            point_name_chars: default_point_name_chars(),
            max_points: default_max_points(),
            example_content_chars: default_example_content_chars(),
            max_examples: default_max_examples(),
        }
    }
}

fn default_chapter_summary_chars() -> usize {
    2000
}
fn default_subsection_name_chars() -> usize {
    300
}
fn default_subsection_content_chars() -> usize {
    3000
}
fn default_subsection_min_matches() -> usize {
    2
}
fn default_term_min_chars() -> usize {
    2
}
fn default_term_max_chars() -> usize {
    80
}
fn default_definition_min_chars() -> usize {
    5
}
fn default_definition_max_chars() -> usize {
    500
}
fn default_max_definitions() -> usize {
    100
}
fn default_point_name_chars() -> usize {
    100
}
fn default_max_points() -> usize {
    50
}
fn default_example_content_chars() -> usize {
    1000
}
fn default_max_examples() -> usize {
    20
}

/// `[keywords]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordsConfig {
    /// Keywords kept per unit.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_keyword_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_keyword_max_chars")]
    pub max_chars: usize,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            max_keywords: default_max_keywords(),
            min_chars: default_keyword_min_chars(),
            max_chars: default_keyword_max_chars(),
        }
    }
}

fn default_max_keywords() -> usize {
    15
}
fn default_keyword_min_chars() -> usize {
    2
}
fn default_keyword_max_chars() -> usize {
    20
}

/// `[persistence]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_unit_name_chars")]
    pub unit_name_chars: usize,
    #[serde(default = "default_unit_content_chars")]
    pub unit_content_chars: usize,
    #[serde(default = "default_full_content_chars")]
    pub full_content_chars: usize,
    /// Characters of unit content copied into the search index.
    #[serde(default = "default_index_content_chars")]
    pub index_content_chars: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            unit_name_chars: default_unit_name_chars(),
            unit_content_chars: default_unit_content_chars(),
            full_content_chars: default_full_content_chars(),
            index_content_chars: default_index_content_chars(),
            max_keywords: default_max_keywords(),
        }
    }
}

fn default_unit_name_chars() -> usize {
    500
}
fn default_unit_content_chars() -> usize {
    10_000
}
fn default_full_content_chars() -> usize {
    50_000
}
fn default_index_content_chars() -> usize {
    5000
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration handed to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub segmentation: SegmentationConfig,
    pub points: PointsConfig,
    pub keywords: KeywordsConfig,
    pub persistence: PersistenceConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            extraction: config.extraction.clone(),
            segmentation: config.segmentation.clone(),
            points: config.points.clone(),
            keywords: config.keywords.clone(),
            persistence: config.persistence.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.coursegraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CourseGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.coursegraph/coursegraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CourseGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CourseGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CourseGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CourseGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` in a configured path to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| CourseGraphError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("gb18030"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.points.max_definitions, 100);
        assert_eq!(parsed.keywords.max_keywords, 15);
        assert_eq!(parsed.persistence.full_content_chars, 50_000);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[points]
max_points = 10

[extraction]
text_encodings = ["utf-8"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.points.max_points, 10);
        assert_eq!(config.points.max_examples, 20);
        assert_eq!(config.extraction.text_encodings, vec!["utf-8".to_string()]);
        assert_eq!(config.segmentation.max_line_sections, 100);
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let mut app = AppConfig::default();
        app.keywords.max_keywords = 8;
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.keywords.max_keywords, 8);
        assert_eq!(pipeline.segmentation.paragraph_min_chars, 50);
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        let path = expand_home("/tmp/coursegraph.db").expect("expand");
        assert_eq!(path, PathBuf::from("/tmp/coursegraph.db"));
    }
}
