//! Validation findings and the report that groups them.

use std::collections::BTreeMap;

use serde::Serialize;

/// How serious a finding is. Errors fail the build; warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// One problem at one place in the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Rule id, e.g. `broken-link`.
    pub rule: &'static str,
    pub severity: Severity,
    /// Path relative to the scanned root, or a pseudo-path such as
    /// `parameters.toml` for registry-level findings.
    pub file: String,
    /// 1-based; 0 when the finding is not tied to a line.
    pub line: usize,
    pub message: String,
}

impl Finding {
    pub fn error(rule: &'static str, file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: Severity::Error,
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn warning(rule: &'static str, file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: Severity::Warning,
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

/// Findings grouped by file, files and lines in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Number of documents checked.
    pub files_checked: usize,
    pub files: BTreeMap<String, Vec<Finding>>,
}

impl ValidationReport {
    pub fn new(files_checked: usize) -> Self {
        Self {
            files_checked,
            files: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, finding: Finding) {
        let entry = self.files.entry(finding.file.clone()).or_default();
        entry.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    /// Sort each file's findings by line, then rule.
    pub fn finish(mut self) -> Self {
        for findings in self.files.values_mut() {
            findings.sort_by(|a, b| (a.line, a.rule, &a.message).cmp(&(b.line, b.rule, &b.message)));
        }
        self
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.files.values().flatten()
    }

    pub fn error_count(&self) -> usize {
        self.findings().filter(|f| f.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings().filter(|f| f.severity == Severity::Warning).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_clean(&self) -> bool {
        self.files.is_empty()
    }

    /// Findings produced by `rule`.
    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings().filter(move |f| f.rule == rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_and_counts() {
        let mut report = ValidationReport::new(3);
        report.push(Finding::warning("raw-latex", "b.html", 9, "raw"));
        report.push(Finding::error("broken-link", "a.qmd", 7, "missing"));
        report.push(Finding::error("broken-link", "a.qmd", 2, "missing"));
        let report = report.finish();

        let files: Vec<_> = report.files.keys().cloned().collect();
        assert_eq!(files, ["a.qmd", "b.html"]);
        assert_eq!(report.files["a.qmd"][0].line, 2);
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.warning_count(), 1);
        assert!(report.has_errors());
        assert_eq!(report.by_rule("broken-link").count(), 2);
    }

    #[test]
    fn test_warnings_only_is_not_an_error() {
        let mut report = ValidationReport::new(1);
        report.push(Finding::warning("raw-latex", "x.html", 1, "raw"));
        assert!(!report.has_errors());
        assert!(!report.is_clean());
    }
}
