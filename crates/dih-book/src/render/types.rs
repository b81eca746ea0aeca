//! Render request and outcome types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use dih_core::config::DihConfig;

/// Output format passed to `quarto render --to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Html,
    Pdf,
    Epub,
    Docx,
    /// Every format, one build each, in the order above.
    All,
}

impl RenderFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Docx => "docx",
            Self::All => "all",
        }
    }

    /// Single-format builds this format expands to.
    pub fn targets(&self) -> Vec<RenderFormat> {
        match self {
            Self::All => vec![Self::Html, Self::Pdf, Self::Epub, Self::Docx],
            single => vec![*single],
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            "epub" => Ok(Self::Epub),
            "docx" => Ok(Self::Docx),
            "all" => Ok(Self::All),
            other => Err(format!("unknown render format `{other}` (expected html, pdf, epub, docx or all)")),
        }
    }
}

/// One renderer invocation.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub format: RenderFormat,
    /// Working directory of the renderer.
    pub source_dir: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    /// Longest silence tolerated before the renderer is killed.
    pub idle_timeout: Duration,
    /// Carried into the outcome: warnings then fail the build.
    pub fail_on_warnings: bool,
}

impl RenderRequest {
    /// `<command> render [--to <format>] <extra_args>`.
    pub fn new(format: RenderFormat, source_dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        let mut args = vec!["render".to_string()];
        if format != RenderFormat::All {
            args.push("--to".to_string());
            args.push(format.as_str().to_string());
        }
        Self {
            format,
            source_dir: source_dir.into(),
            command: command.into(),
            args,
            idle_timeout: Duration::from_secs(300),
            fail_on_warnings: true,
        }
    }

    /// Request for `format` using the `[render]` and `[book]` settings.
    pub fn from_config(config: &DihConfig, root: &Path, format: RenderFormat) -> Self {
        let mut request = Self::new(
            format,
            config.book.effective_source_dir(root),
            config.render.effective_command(),
        );
        request.idle_timeout = config.render.effective_timeout();
        request.fail_on_warnings = config.render.effective_fail_on_warnings();
        request
    }

    pub fn with_extra_args<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(extra.into_iter().map(Into::into));
        self
    }

    /// The command line as it would be typed, for logs.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

/// `[ 3/120] chapters/x.qmd`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Succeeded,
    WarningsDetected,
    Failed,
    TimedOut,
    Cancelled,
}

/// What happened to one renderer invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub format: RenderFormat,
    pub status: RenderStatus,
    /// `None` when the renderer was killed.
    pub exit_code: Option<i32>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub last_progress: Option<Progress>,
    /// Output lines received from both streams.
    pub lines: usize,
    pub fail_on_warnings: bool,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl RenderOutcome {
    /// Killed, non-zero exit, error lines, or warnings when they count.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            RenderStatus::Failed | RenderStatus::TimedOut | RenderStatus::Cancelled
        ) || !self.errors.is_empty()
            || (self.fail_on_warnings && !self.warnings.is_empty())
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
