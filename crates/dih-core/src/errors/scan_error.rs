//! Document scanning errors.

use std::path::PathBuf;

use super::error_code::{self, DihErrorCode};

/// Errors that can occur while walking or reading the book tree.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("IO error scanning {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Source root does not exist: {path}")]
    MissingRoot { path: PathBuf },

    #[error("Invalid ignore pattern `{pattern}`: {message}")]
    InvalidIgnore { pattern: String, message: String },

    #[error("File too large: {path} ({size} bytes, max {max})")]
    MaxFileSizeExceeded { path: PathBuf, size: u64, max: u64 },

    #[error("Scan cancelled")]
    Cancelled,
}

impl DihErrorCode for ScanError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => error_code::CANCELLED,
            _ => error_code::SCAN_ERROR,
        }
    }
}
