//! Renderer supervision configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the external renderer is invoked and judged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RenderConfig {
    /// Renderer executable. Default: `quarto`.
    pub command: Option<String>,
    /// Seconds without any renderer output before the build is killed. Default: 300.
    pub timeout_secs: Option<u64>,
    /// Treat warning lines as a failed build. Default: true.
    pub fail_on_warnings: Option<bool>,
    /// Extra regexes classifying a line as a warning.
    #[serde(default)]
    pub extra_warning_patterns: Vec<String>,
    /// Regexes for lines that must never count as warnings or errors.
    #[serde(default)]
    pub ignore_warning_patterns: Vec<String>,
}

impl RenderConfig {
    pub fn effective_command(&self) -> &str {
        self.command.as_deref().unwrap_or("quarto")
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(300))
    }

    pub fn effective_fail_on_warnings(&self) -> bool {
        self.fail_on_warnings.unwrap_or(true)
    }
}
