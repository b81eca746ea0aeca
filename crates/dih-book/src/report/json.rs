//! JSON reporter.

use std::collections::BTreeMap;

use serde::Serialize;

use super::Reporter;
use crate::audit::UsageAudit;
use crate::render::BookRender;
use crate::validation::{Finding, ValidationReport};

/// Pretty-printed JSON of the underlying result types.
pub struct JsonReporter;

#[derive(Serialize)]
struct ValidationJson<'a> {
    files_checked: usize,
    errors: usize,
    warnings: usize,
    passed: bool,
    files: &'a BTreeMap<String, Vec<Finding>>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn validation(&self, report: &ValidationReport) -> Result<String, String> {
        to_json(&ValidationJson {
            files_checked: report.files_checked,
            errors: report.error_count(),
            warnings: report.warning_count(),
            passed: !report.has_errors(),
            files: &report.files,
        })
    }

    fn audit(&self, audit: &UsageAudit) -> Result<String, String> {
        to_json(audit)
    }

    fn render(&self, render: &BookRender) -> Result<String, String> {
        to_json(render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_json_shape() {
        let mut report = ValidationReport::new(2);
        report.push(Finding::error("broken-link", "a.qmd", 3, "missing"));
        let json = JsonReporter.validation(&report.finish()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["errors"], 1);
        assert_eq!(value["passed"], false);
        assert_eq!(value["files"]["a.qmd"][0]["rule"], "broken-link");
        assert_eq!(value["files"]["a.qmd"][0]["severity"], "error");
    }
}
