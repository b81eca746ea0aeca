//! dih-book: everything that reads or builds the book itself.
//!
//! - Scanner: parallel source and output tree reads
//! - Qmd: link, variable, label, cross-reference and math extraction
//! - Validation: pre-render source checks, post-render output checks
//! - Audit: parameter usage across chapters
//! - References: bibliography → `references.json`
//! - Narration: audiobook text chunks
//! - Render: supervised renderer runs with idle timeout
//! - Report: console and JSON reporters

pub mod audit;
pub mod book;
pub mod narration;
pub mod qmd;
pub mod references;
pub mod render;
pub mod report;
pub mod scanner;
pub mod validation;

pub use audit::{audit_usage, UsageAudit};
pub use book::Book;
pub use narration::{chunk_text, narration_text, prepare_book, prepare_chapter, NarrationManifest};
pub use references::{extract_references, write_references_json, Reference};
pub use render::{render_book, BookRender, RenderFormat, RenderMonitor, RenderOutcome, RenderRequest, RenderStatus};
pub use report::{create_reporter, Reporter};
pub use scanner::{ScanConfig, ScanResult, Scanner, SourceFile};
pub use validation::{Finding, PostRenderValidator, PreRenderValidator, Severity, ValidationReport};
