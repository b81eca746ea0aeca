//! Renderer supervision errors.

use super::error_code::{self, DihErrorCode};

/// Errors raised by the render monitor itself. A build that runs but
/// reports warnings is not an error; it is a `RenderOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Failed waiting on renderer: {source}")]
    Wait { source: std::io::Error },

    #[error("Invalid output pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl DihErrorCode for RenderError {
    fn error_code(&self) -> &'static str {
        error_code::RENDER_ERROR
    }
}
