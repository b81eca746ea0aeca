//! Reporters: output formats for validation reports, usage audits and
//! render results.

pub mod console;
pub mod json;

use crate::audit::UsageAudit;
use crate::render::BookRender;
use crate::validation::ValidationReport;

/// Trait for report generation.
pub trait Reporter: Send + Sync {
    fn name(&self) -> &'static str;
    fn validation(&self, report: &ValidationReport) -> Result<String, String>;
    fn audit(&self, audit: &UsageAudit) -> Result<String, String>;
    fn render(&self, render: &BookRender) -> Result<String, String>;
}

/// Create a reporter by format name.
pub fn create_reporter(format: &str, use_color: bool) -> Option<Box<dyn Reporter>> {
    match format {
        "console" => Some(Box::new(console::ConsoleReporter::new(use_color))),
        "json" => Some(Box::new(json::JsonReporter)),
        _ => None,
    }
}

/// List all available reporter format names.
pub fn available_formats() -> &'static [&'static str] {
    &["console", "json"]
}
