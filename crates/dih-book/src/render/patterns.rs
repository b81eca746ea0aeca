//! Classification of renderer output lines.

use once_cell::sync::Lazy;
use regex::Regex;

use dih_core::config::RenderConfig;
use dih_core::errors::RenderError;

static ANSI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

const ERROR_PATTERNS: &[&str] = &[
    r"^\s*ERROR\b",
    r"\bError:",
    r"^! ",
    r"Undefined control sequence",
    r"^\s*compilation failed",
];

const WARNING_PATTERNS: &[&str] = &[
    r"\bWARNING\b",
    r"\bWARN:",
    r"unable to resolve crossref",
    r"^LaTeX Warning:",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Error,
    Warning,
    Info,
}

/// Error and warning regexes, with an ignore list that wins over both.
#[derive(Debug, Clone)]
pub struct OutputClassifier {
    errors: Vec<Regex>,
    warnings: Vec<Regex>,
    ignore: Vec<Regex>,
}

impl OutputClassifier {
    pub fn new(extra_warnings: &[String], ignore: &[String]) -> Result<Self, RenderError> {
        let errors = compile(ERROR_PATTERNS.iter().copied())?;
        let mut warnings = compile(WARNING_PATTERNS.iter().copied())?;
        warnings.extend(compile(extra_warnings.iter().map(String::as_str))?);
        let ignore = compile(ignore.iter().map(String::as_str))?;
        Ok(Self {
            errors,
            warnings,
            ignore,
        })
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        Self::new(&config.extra_warning_patterns, &config.ignore_warning_patterns)
    }

    /// Classify one line; ANSI color codes are ignored.
    pub fn classify(&self, line: &str) -> LineClass {
        let plain = strip_ansi(line);
        if self.ignore.iter().any(|re| re.is_match(&plain)) {
            return LineClass::Info;
        }
        if self.errors.iter().any(|re| re.is_match(&plain)) {
            return LineClass::Error;
        }
        if self.warnings.iter().any(|re| re.is_match(&plain)) {
            return LineClass::Warning;
        }
        LineClass::Info
    }
}

pub fn strip_ansi(line: &str) -> String {
    ANSI_RE.replace_all(line, "").into_owned()
}

fn compile<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<Vec<Regex>, RenderError> {
    patterns
        .map(|p| {
            Regex::new(p).map_err(|e| RenderError::InvalidPattern {
                pattern: p.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> OutputClassifier {
        OutputClassifier::new(&[], &[]).unwrap()
    }

    #[test]
    fn test_default_classes() {
        let c = classifier();
        assert_eq!(c.classify("WARNING (/x/quarto.js:1) unable to resolve crossref @fig-x"), LineClass::Warning);
        assert_eq!(c.classify("WARN: missing alt text"), LineClass::Warning);
        assert_eq!(c.classify("ERROR: YAML parse failure"), LineClass::Error);
        assert_eq!(c.classify("! Undefined control sequence."), LineClass::Error);
        assert_eq!(c.classify("[ 3/120] chapters/x.qmd"), LineClass::Info);
        assert_eq!(c.classify("Output created: _book/index.html"), LineClass::Info);
    }

    #[test]
    fn test_ansi_stripped() {
        assert_eq!(classifier().classify("\x1b[33mWARNING\x1b[0m: x"), LineClass::Warning);
    }

    #[test]
    fn test_extra_and_ignored_patterns() {
        let c = OutputClassifier::new(
            &[r"Overfull \\hbox".to_string()],
            &[r"WARNING.*font cache".to_string()],
        )
        .unwrap();
        assert_eq!(c.classify(r"Overfull \hbox (3pt too wide)"), LineClass::Warning);
        assert_eq!(c.classify("WARNING: rebuilding font cache"), LineClass::Info);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = OutputClassifier::new(&["(".to_string()], &[]).unwrap_err();
        assert!(matches!(err, RenderError::InvalidPattern { .. }));
    }
}
