//! Checks over the rendered HTML tree.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use tracing::{info, warn};

use dih_core::errors::ScanError;

use crate::qmd::line_at;
use crate::scanner::{ScanConfig, Scanner, SourceFile};

use super::findings::{Finding, ValidationReport};

pub const UNRESOLVED_SHORTCODE: &str = "unresolved-shortcode";
pub const UNRESOLVED_CROSSREF: &str = "unresolved-crossref";
pub const BROKEN_OUTPUT_LINK: &str = "broken-output-link";
pub const RAW_LATEX: &str = "raw-latex";

/// Elements whose content is never checked.
static OPAQUE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "pre", "code"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")).unwrap())
        .collect()
});
static SHORTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(?:<|&lt;)\s*var\s+([A-Za-z0-9_.\-]+)").unwrap());
static UNRESOLVED_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\?@((?:sec|fig|tbl|eq)-[\w\-]+)").unwrap());
static URL_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:href|src)\s*=\s*["']([^"']*)["']"#).unwrap());
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
static MATH_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<span class="math[^"]*">.*?</span>"#).unwrap());

/// Validates a rendered book directory.
pub struct PostRenderValidator {
    output_dir: PathBuf,
}

impl PostRenderValidator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Scan every `.html` page under the output directory.
    pub fn validate(&self) -> Result<ValidationReport, ScanError> {
        let scan = Scanner::new(ScanConfig::rendered(&self.output_dir))?.scan()?;
        for err in &scan.errors {
            warn!(error = %err, "skipped rendered page");
        }
        let report = self.validate_pages(&scan.files);
        info!(
            pages = scan.files.len(),
            errors = report.error_count(),
            warnings = report.warning_count(),
            "post-render validation complete"
        );
        Ok(report)
    }

    /// Check already-loaded pages.
    pub fn validate_pages(&self, pages: &[SourceFile]) -> ValidationReport {
        let findings: Vec<Finding> = pages
            .par_iter()
            .flat_map_iter(|page| self.check_page(page))
            .collect();
        let mut report = ValidationReport::new(pages.len());
        report.extend(findings);
        report.finish()
    }

    fn check_page(&self, page: &SourceFile) -> Vec<Finding> {
        let text = blank_opaque(&page.content);
        let file = page.rel_path.as_str();
        let mut out = Vec::new();

        for cap in SHORTCODE_RE.captures_iter(&text) {
            if let Some(m) = cap.get(0) {
                out.push(Finding::error(
                    UNRESOLVED_SHORTCODE,
                    file,
                    line_at(&text, m.start()),
                    format!("variable shortcode `{}` was not resolved", &cap[1]),
                ));
            }
        }

        for cap in UNRESOLVED_REF_RE.captures_iter(&text) {
            if let Some(m) = cap.get(0) {
                out.push(Finding::error(
                    UNRESOLVED_CROSSREF,
                    file,
                    line_at(&text, m.start()),
                    format!("cross-reference `@{}` was not resolved", &cap[1]),
                ));
            }
        }

        let dir = page.abs_path.parent().unwrap_or(&self.output_dir);
        for cap in URL_ATTR_RE.captures_iter(&text) {
            let Some(m) = cap.get(1) else { continue };
            let Some(target) = local_target(m.as_str()) else { continue };
            if !self.target_exists(dir, &target) {
                out.push(Finding::error(
                    BROKEN_OUTPUT_LINK,
                    file,
                    line_at(&text, m.start()),
                    format!("`{target}` does not exist in the output"),
                ));
            }
        }

        let prose = MATH_SPAN_RE.replace_all(&text, |caps: &regex::Captures| blank_keep_lines(&caps[0]));
        for (idx, line) in prose.lines().enumerate() {
            if line.contains("$$") {
                out.push(Finding::warning(
                    RAW_LATEX,
                    file,
                    idx + 1,
                    "raw `$$` math delimiter in rendered output",
                ));
            }
        }
        out
    }

    fn target_exists(&self, dir: &Path, target: &str) -> bool {
        let path = match target.strip_prefix('/') {
            Some(rooted) => self.output_dir.join(rooted),
            None => dir.join(target),
        };
        path.exists()
    }
}

/// Local path part of a URL attribute, `None` for external or in-page targets.
fn local_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.starts_with("//") || raw.contains("{{") {
        return None;
    }
    if SCHEME_RE.is_match(raw) {
        return None;
    }
    let path = raw.split(|c| c == '#' || c == '?').next().unwrap_or("");
    if path.is_empty() {
        return None;
    }
    Some(path.replace("%20", " ").replace("&amp;", "&"))
}

fn blank_opaque(html: &str) -> String {
    let mut text = html.to_string();
    for re in OPAQUE_RES.iter() {
        text = re
            .replace_all(&text, |caps: &regex::Captures| blank_keep_lines(&caps[0]))
            .into_owned();
    }
    text
}

/// Same byte length, newlines kept.
fn blank_keep_lines(s: &str) -> String {
    s.bytes()
        .map(|b| if b == b'\n' { '\n' } else { ' ' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_target() {
        assert_eq!(local_target("chapters/a.html#sec-x").as_deref(), Some("chapters/a.html"));
        assert_eq!(local_target("site_libs/x.js?v=1").as_deref(), Some("site_libs/x.js"));
        assert_eq!(local_target("https://example.org"), None);
        assert_eq!(local_target("mailto:a@b.org"), None);
        assert_eq!(local_target("#top"), None);
        assert_eq!(local_target("//cdn.example.org/x.js"), None);
    }

    #[test]
    fn test_blank_opaque_keeps_lines() {
        let html = "<p>a</p>\n<script>\nvar x = \"$$\";\n</script>\n<p>$$</p>\n";
        let blanked = blank_opaque(html);
        assert_eq!(blanked.len(), html.len());
        assert_eq!(blanked.lines().count(), html.lines().count());
        assert!(!blanked.contains("var x"));
        assert!(blanked.contains("<p>$$</p>"));
    }
}
