//! Parameter registry and formula errors.

use super::error_code::{self, DihErrorCode};

/// Errors raised while defining, loading or deriving parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("Invalid parameter name `{name}`: must be UPPER_SNAKE_CASE")]
    InvalidName { name: String },

    #[error("Parameter `{name}` is defined more than once")]
    Duplicate { name: String },

    #[error("Parameter `{name}` references `{input}`, which is not defined before it")]
    UndefinedInput { name: String, input: String },

    #[error("Parameter `{name}` has no value and no formula")]
    MissingValue { name: String },

    #[error("Parameter `{name}` is marked calculated but has no formula")]
    MissingFormula { name: String },

    #[error("Parameter `{name}` has an inverted confidence interval ({low} > {high})")]
    InvalidInterval { name: String, low: f64, high: f64 },

    #[error("Formula for `{name}` failed to parse at {position}: {message}")]
    FormulaSyntax {
        name: String,
        position: usize,
        message: String,
    },

    #[error("Formula for `{name}` evaluated to a non-finite value: {message}")]
    NonFinite { name: String, message: String },

    #[error("Unknown parameter `{name}`")]
    NotFound { name: String },

    #[error("Failed to read parameter file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse parameter file {path}: {message}")]
    Parse { path: String, message: String },
}

impl DihErrorCode for ParameterError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::FormulaSyntax { .. } | Self::NonFinite { .. } => error_code::FORMULA_ERROR,
            _ => error_code::PARAMETER_ERROR,
        }
    }
}
