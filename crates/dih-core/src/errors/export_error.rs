//! Generated-file export errors.

use std::path::PathBuf;

use super::error_code::{self, DihErrorCode};

/// Errors raised while writing generated artifacts
/// (variables YAML, references JSON, appendix, narration chunks).
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization failed for {what}: {message}")]
    Serialize { what: String, message: String },
}

impl DihErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        error_code::EXPORT_ERROR
    }
}
