//! Book rendering under supervision.

pub mod monitor;
pub mod patterns;
pub mod progress;
pub mod types;

pub use monitor::RenderMonitor;
pub use patterns::{LineClass, OutputClassifier};
pub use progress::parse_progress;
pub use types::{OutputLine, Progress, RenderFormat, RenderOutcome, RenderRequest, RenderStatus, Stream};

use serde::Serialize;
use tracing::{error, info};

use dih_core::errors::BookError;
use dih_core::traits::cancellation::{Cancellable, CancellationToken};

use crate::book::Book;
use crate::validation::ValidationReport;

/// Pre-render validation (if run) and one outcome per attempted format.
#[derive(Debug, Clone, Serialize)]
pub struct BookRender {
    pub validation: Option<ValidationReport>,
    pub outcomes: Vec<RenderOutcome>,
}

impl BookRender {
    /// Validation errors stop the build before the renderer starts.
    pub fn aborted_by_validation(&self) -> bool {
        self.validation.as_ref().is_some_and(|r| r.has_errors())
    }

    pub fn is_failure(&self) -> bool {
        self.aborted_by_validation()
            || self.outcomes.iter().any(RenderOutcome::is_failure)
    }
}

/// Validate (unless skipped), then render each target format in order,
/// stopping at the first failed build. A token cancelled between builds
/// ends the run with [`BookError::Cancelled`].
pub fn render_book(
    book: &Book,
    format: RenderFormat,
    skip_validation: bool,
    cancel: Option<CancellationToken>,
) -> Result<BookRender, BookError> {
    let config = book.config();
    let mut result = BookRender {
        validation: None,
        outcomes: Vec::new(),
    };

    if !skip_validation {
        let report = book.validate()?;
        let errors = report.error_count();
        result.validation = Some(report);
        if errors > 0 {
            error!(errors, "pre-render validation failed, not rendering");
            return Ok(result);
        }
    }

    let mut monitor = RenderMonitor::new(OutputClassifier::from_config(&config.render)?);
    if let Some(ref token) = cancel {
        monitor = monitor.with_cancellation(token.clone());
    }

    for target in format.targets() {
        if cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(BookError::Cancelled);
        }
        let request = RenderRequest::from_config(config, book.root(), target);
        let outcome = monitor.run(&request)?;
        let failed = outcome.is_failure();
        result.outcomes.push(outcome);
        if failed {
            error!(format = %target, "render failed, skipping remaining formats");
            break;
        }
    }
    info!(formats = result.outcomes.len(), failed = result.is_failure(), "render complete");
    Ok(result)
}
