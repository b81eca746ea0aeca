//! Errors from whole-book operations.

use super::error_code::{self, DihErrorCode};
use super::{ConfigError, ExportError, ParameterError, RenderError, ScanError};

/// Errors that can occur while running a book operation end to end.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DihErrorCode for BookError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Parameter(e) => e.error_code(),
            Self::Scan(e) => e.error_code(),
            Self::Export(e) => e.error_code(),
            Self::Render(e) => e.error_code(),
            Self::Cancelled => error_code::CANCELLED,
        }
    }
}
