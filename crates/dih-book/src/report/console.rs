//! Console reporter: human-readable output with optional color codes.

use std::fmt::Write as _;

use super::Reporter;
use crate::audit::UsageAudit;
use crate::render::{BookRender, RenderStatus};
use crate::validation::{Severity, ValidationReport};

pub struct ConsoleReporter {
    pub use_color: bool,
}

impl ConsoleReporter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn color_start(&self, severity: Severity) -> &'static str {
        if !self.use_color {
            return "";
        }
        match severity {
            Severity::Error => "\x1b[31m",
            Severity::Warning => "\x1b[33m",
        }
    }

    fn color_end(&self) -> &'static str {
        if self.use_color {
            "\x1b[0m"
        } else {
            ""
        }
    }

    fn status_symbol(&self, status: RenderStatus) -> &'static str {
        match status {
            RenderStatus::Succeeded => "✓",
            RenderStatus::WarningsDetected => "⚠",
            RenderStatus::Failed => "✗",
            RenderStatus::TimedOut => "⏱",
            RenderStatus::Cancelled => "⊘",
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reporter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "console"
    }

    fn validation(&self, report: &ValidationReport) -> Result<String, String> {
        let mut out = String::new();
        for (file, findings) in &report.files {
            let _ = writeln!(out, "{file}");
            for f in findings {
                let _ = writeln!(
                    out,
                    "  {}:{} {}{}{} [{}] {}",
                    file,
                    f.line,
                    self.color_start(f.severity),
                    f.severity.as_str(),
                    self.color_end(),
                    f.rule,
                    f.message
                );
            }
            out.push('\n');
        }
        let errors = report.error_count();
        let warnings = report.warning_count();
        let _ = writeln!(
            out,
            "─── {} file(s) checked: {errors} error(s), {warnings} warning(s) ───",
            report.files_checked
        );
        out.push_str(if errors == 0 { "Result: PASSED ✓\n" } else { "Result: FAILED ✗\n" });
        Ok(out)
    }

    fn audit(&self, audit: &UsageAudit) -> Result<String, String> {
        let mut out = String::new();
        let _ = writeln!(out, "Parameter usage ({} file(s))", audit.files_scanned);
        for usage in &audit.usages {
            let _ = writeln!(out, "  {:<48} {:>4}  {}", usage.name, usage.count, usage.files.join(", "));
        }

        if !audit.unused.is_empty() {
            let _ = writeln!(out, "\nUnused parameters ({}):", audit.unused.len());
            for name in &audit.unused {
                let _ = writeln!(out, "  {name}");
            }
        }
        if !audit.unknown.is_empty() {
            let _ = writeln!(out, "\nUnknown variables ({}):", audit.unknown.len());
            for v in &audit.unknown {
                let _ = writeln!(
                    out,
                    "  {}:{} {}error{} `{}`",
                    v.file,
                    v.line,
                    self.color_start(Severity::Error),
                    self.color_end(),
                    v.name
                );
            }
        }
        if !audit.hardcoded.is_empty() {
            let _ = writeln!(out, "\nHardcoded values ({}):", audit.hardcoded.len());
            for h in &audit.hardcoded {
                let _ = writeln!(
                    out,
                    "  {}:{} {}warning{} `{}` matches {}; use {{{{< var {} >}}}}",
                    h.file,
                    h.line,
                    self.color_start(Severity::Warning),
                    self.color_end(),
                    h.display,
                    h.parameter,
                    h.parameter.to_ascii_lowercase()
                );
            }
        }

        let used = audit.usages.iter().filter(|u| u.count > 0).count();
        let _ = writeln!(
            out,
            "\n─── {used}/{} parameters used, {} unknown, {} hardcoded ───",
            audit.usages.len(),
            audit.unknown.len(),
            audit.hardcoded.len()
        );
        Ok(out)
    }

    fn render(&self, render: &BookRender) -> Result<String, String> {
        let mut out = String::new();
        if let Some(ref report) = render.validation {
            if report.has_errors() {
                out.push_str(&self.validation(report)?);
                out.push_str("Render skipped: pre-render validation failed.\n");
                return Ok(out);
            }
        }
        for outcome in &render.outcomes {
            let _ = writeln!(
                out,
                "{} {} {:?} (exit {}, {:.1}s)",
                self.status_symbol(outcome.status),
                outcome.format,
                outcome.status,
                outcome
                    .exit_code
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
                outcome.duration.as_secs_f64()
            );
            if let Some(ref p) = outcome.last_progress {
                let _ = writeln!(out, "  last progress: [{}/{}] {}", p.current, p.total, p.file);
            }
            for line in &outcome.errors {
                let _ = writeln!(
                    out,
                    "  {}error{}: {line}",
                    self.color_start(Severity::Error),
                    self.color_end()
                );
            }
            for line in &outcome.warnings {
                let _ = writeln!(
                    out,
                    "  {}warning{}: {line}",
                    self.color_start(Severity::Warning),
                    self.color_end()
                );
            }
        }
        out.push_str(if render.is_failure() { "Result: FAILED ✗\n" } else { "Result: PASSED ✓\n" });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Finding;

    #[test]
    fn test_validation_output_without_color() {
        let mut report = ValidationReport::new(4);
        report.push(Finding::error("broken-link", "chapters/a.qmd", 12, "link target `x.qmd` does not exist"));
        report.push(Finding::warning("raw-latex", "chapters/a.qmd", 3, "raw"));
        let text = ConsoleReporter::new(false).validation(&report.finish()).unwrap();
        assert!(text.contains("  chapters/a.qmd:3 warning [raw-latex] raw\n"));
        assert!(text.contains("  chapters/a.qmd:12 error [broken-link] link target `x.qmd` does not exist\n"));
        assert!(text.contains("4 file(s) checked: 1 error(s), 1 warning(s)"));
        assert!(text.ends_with("Result: FAILED ✗\n"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_clean_report_passes() {
        let text = ConsoleReporter::new(true)
            .validation(&ValidationReport::new(2))
            .unwrap();
        assert!(text.ends_with("Result: PASSED ✓\n"));
    }
}
