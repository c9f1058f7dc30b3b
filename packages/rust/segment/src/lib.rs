//! Text segmentation and knowledge point extraction for CourseGraph.
//!
//! Pure, in-memory stages that turn extracted document text into unit drafts:
//! - [`sections`] — cascade of section strategies ([`Segmenter`])
//! - [`points`] — per-section chapter, subsection, definition, point and example drafts
//! - [`keywords`] — frequency-ranked keyword lists

pub mod keywords;
pub mod points;
pub mod sections;

pub use keywords::extract_keywords;
pub use points::{UnitDraft, extract_points};
pub use sections::{Section, SectionStrategy, Segmenter, segment};
