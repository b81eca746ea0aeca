//! Renderer progress lines.

use once_cell::sync::Lazy;
use regex::Regex;

use super::patterns::strip_ansi;
use super::types::Progress;

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[\s*(\d+)\s*/\s*(\d+)\s*\]\s+(\S.*?)\s*$").unwrap());

/// Parse `[ 3/120] chapters/x.qmd`.
pub fn parse_progress(line: &str) -> Option<Progress> {
    let plain = strip_ansi(line);
    let cap = PROGRESS_RE.captures(&plain)?;
    let current = cap[1].parse().ok()?;
    let total = cap[2].parse().ok()?;
    Some(Progress {
        current,
        total,
        file: cap[3].to_string(),
    })
}
