//! Source-level checks run before the renderer.

use std::path::{Path, PathBuf};
use std::time::Instant;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use dih_core::config::ValidationConfig;
use dih_params::export::variables_document;
use dih_params::ParameterRegistry;

use crate::qmd::{self, MathSegment};
use crate::scanner::SourceFile;

use super::findings::{Finding, ValidationReport};

static ENV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(begin|end)\s*\{([A-Za-z*]+)\}").unwrap());

pub const BROKEN_LINK: &str = "broken-link";
pub const LATEX_UNBALANCED_DELIMITER: &str = "latex-unbalanced-delimiter";
pub const LATEX_UNBALANCED_BRACES: &str = "latex-unbalanced-braces";
pub const LATEX_UNMATCHED_ENVIRONMENT: &str = "latex-unmatched-environment";
pub const UNREGISTERED_VARIABLE: &str = "unregistered-variable";
pub const UNDEFINED_CROSSREF: &str = "undefined-crossref";
pub const DUPLICATE_LABEL: &str = "duplicate-label";
pub const UNKNOWN_CITATION: &str = "unknown-citation";

/// Every variable key the generated variables file defines for `registry`.
pub fn variable_keys(registry: &ParameterRegistry) -> FxHashSet<String> {
    variables_document(registry)
        .keys()
        .filter_map(|k| k.as_str().map(str::to_string))
        .collect()
}

struct Citations<'a> {
    registry: &'a ParameterRegistry,
    reference_ids: FxHashSet<String>,
    origin: String,
}

/// Checks book sources for broken links, malformed math, unknown
/// variables and dangling cross-references.
pub struct PreRenderValidator<'a> {
    root: PathBuf,
    config: ValidationConfig,
    known_variables: FxHashSet<String>,
    citations: Option<Citations<'a>>,
}

/// What one document contributes to the book-wide checks.
#[derive(Default)]
struct DocumentScan {
    findings: Vec<Finding>,
    labels: Vec<(String, usize)>,
    crossrefs: Vec<(String, usize)>,
}

impl<'a> PreRenderValidator<'a> {
    /// `root` resolves root-absolute links (`/chapters/x.qmd`).
    pub fn new(root: impl Into<PathBuf>, config: &ValidationConfig, known_variables: FxHashSet<String>) -> Self {
        Self {
            root: root.into(),
            config: config.clone(),
            known_variables,
            citations: None,
        }
    }

    /// Also check that every parameter source is in the bibliography.
    /// `origin` names the parameter file in findings.
    pub fn with_citations(
        mut self,
        registry: &'a ParameterRegistry,
        reference_ids: FxHashSet<String>,
        origin: impl Into<String>,
    ) -> Self {
        self.citations = Some(Citations {
            registry,
            reference_ids,
            origin: origin.into(),
        });
        self
    }

    pub fn validate(&self, files: &[SourceFile]) -> ValidationReport {
        let start = Instant::now();
        let scans: Vec<(&SourceFile, DocumentScan)> = files
            .par_iter()
            .map(|file| (file, self.check_document(file)))
            .collect();

        let mut report = ValidationReport::new(files.len());
        let mut defined: FxHashMap<&str, (&str, usize)> = FxHashMap::default();

        for (file, scan) in &scans {
            report.extend(scan.findings.iter().cloned());
            for (id, line) in &scan.labels {
                match defined.get(id.as_str()) {
                    Some(&(first_file, first_line)) => report.push(Finding::error(
                        DUPLICATE_LABEL,
                        file.rel_path.as_str(),
                        *line,
                        format!("label `{id}` already defined at {first_file}:{first_line}"),
                    )),
                    None => {
                        defined.insert(id.as_str(), (file.rel_path.as_str(), *line));
                    }
                }
            }
        }

        if self.config.effective_check_crossrefs() {
            for (file, scan) in &scans {
                for (id, line) in &scan.crossrefs {
                    if !defined.contains_key(id.as_str()) {
                        report.push(Finding::error(
                            UNDEFINED_CROSSREF,
                            file.rel_path.as_str(),
                            *line,
                            format!("`@{id}` does not match any label in the book"),
                        ));
                    }
                }
            }
        }

        if self.config.effective_check_citations() {
            if let Some(ref citations) = self.citations {
                report.extend(check_citations(citations));
            }
        }

        let report = report.finish();
        info!(
            files = files.len(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pre-render validation complete"
        );
        report
    }

    fn check_document(&self, file: &SourceFile) -> DocumentScan {
        let mut scan = DocumentScan::default();
        let text = &file.content;

        if self.config.effective_check_links() {
            let dir = file.abs_path.parent().unwrap_or(&self.root);
            for link in qmd::links(text) {
                if !self.link_exists(dir, &link.target) {
                    let what = if link.is_image { "image" } else { "link" };
                    scan.findings.push(Finding::error(
                        BROKEN_LINK,
                        file.rel_path.as_str(),
                        link.line,
                        format!("{what} target `{}` does not exist", link.target),
                    ));
                }
            }
        }

        if self.config.effective_check_latex() {
            for segment in qmd::math_segments(text) {
                if let Some(finding) = check_math(&file.rel_path, &segment) {
                    scan.findings.push(finding);
                }
            }
        }

        if self.config.effective_check_variables() {
            for var in qmd::variable_refs(text) {
                if !self.known_variables.contains(&var.name) {
                    scan.findings.push(Finding::error(
                        UNREGISTERED_VARIABLE,
                        file.rel_path.as_str(),
                        var.line,
                        format!("variable `{}` is not in the parameter registry", var.name),
                    ));
                }
            }
        }

        scan.labels = qmd::labels(text).into_iter().map(|l| (l.id, l.line)).collect();
        scan.crossrefs = qmd::crossrefs(text).into_iter().map(|l| (l.id, l.line)).collect();
        debug!(file = %file.rel_path, findings = scan.findings.len(), "checked document");
        scan
    }

    /// A rendered-page link (`x.html`) counts when its source exists.
    fn link_exists(&self, dir: &Path, target: &str) -> bool {
        let path = match target.strip_prefix('/') {
            Some(rooted) => self.root.join(rooted),
            None => dir.join(target),
        };
        if path.exists() {
            return true;
        }
        if path.extension().is_some_and(|e| e == "html") {
            return ["qmd", "md", "ipynb"]
                .iter()
                .any(|ext| path.with_extension(ext).exists());
        }
        false
    }
}

fn check_math(file: &str, segment: &MathSegment) -> Option<Finding> {
    if !segment.closed {
        return Some(Finding::error(
            LATEX_UNBALANCED_DELIMITER,
            file,
            segment.line,
            "`$$` display math is never closed",
        ));
    }
    if !braces_balanced(&segment.content) {
        return Some(Finding::error(
            LATEX_UNBALANCED_BRACES,
            file,
            segment.line,
            format!("unbalanced braces in math `{}`", preview(&segment.content)),
        ));
    }
    environment_problem(&segment.content)
        .map(|message| Finding::error(LATEX_UNMATCHED_ENVIRONMENT, file, segment.line, message))
}

/// `{`/`}` balance, skipping escaped braces.
fn braces_balanced(content: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// First `\begin`/`\end` mismatch, if any.
fn environment_problem(content: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for cap in ENV_RE.captures_iter(content) {
        let name = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        if &cap[1] == "begin" {
            stack.push(name);
            continue;
        }
        match stack.pop() {
            Some(open) if open == name => {}
            Some(open) => return Some(format!("`\\end{{{name}}}` closes `\\begin{{{open}}}`")),
            None => return Some(format!("`\\end{{{name}}}` without matching `\\begin`")),
        }
    }
    stack
        .last()
        .map(|open| format!("`\\begin{{{open}}}` is never closed"))
}

fn preview(content: &str) -> String {
    let flat: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 40 {
        let cut: String = flat.chars().take(40).collect();
        format!("{cut}…")
    } else {
        flat
    }
}

fn check_citations(citations: &Citations<'_>) -> Vec<Finding> {
    citations
        .registry
        .iter()
        .filter_map(|param| {
            let source = param.source.as_ref()?;
            if citations.reference_ids.contains(&source.id) {
                return None;
            }
            Some(Finding::error(
                UNKNOWN_CITATION,
                citations.origin.as_str(),
                0,
                format!(
                    "{} cites `{}` which is not in the references",
                    param.name, source.id
                ),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braces() {
        assert!(braces_balanced(r"\frac{a}{b}"));
        assert!(braces_balanced(r"\{ x \}"));
        assert!(!braces_balanced(r"\frac{a}{b"));
        assert!(!braces_balanced(r"a}{"));
    }

    #[test]
    fn test_environments() {
        assert_eq!(environment_problem(r"\begin{aligned} x \end{aligned}"), None);
        assert!(environment_problem(r"\begin{aligned} x \end{cases}")
            .unwrap()
            .contains("closes"));
        assert!(environment_problem(r"\begin{cases} x").unwrap().contains("never closed"));
        assert!(environment_problem(r"x \end{cases}").unwrap().contains("without"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x + ".repeat(30);
        assert!(preview(&long).ends_with('…'));
        assert_eq!(preview("a\n  b"), "a b");
    }
}
