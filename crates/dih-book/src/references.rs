//! Bibliography extraction from the references document.
//!
//! Entries look like
//!
//! ```markdown
//! <a id="sipri-2024"></a>
//! SIPRI. *Trends in World Military Expenditure, 2024*.
//! [sipri.org](https://www.sipri.org/publications/2025/fs-2504)
//! ```
//!
//! or a heading carrying the id: `### SIPRI 2024 {#sipri-2024}`.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{info, warn};

use dih_core::errors::ExportError;
use dih_params::export::{write_if_changed, WriteStatus};

use crate::qmd;

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a\s+(?:id|name)\s*=\s*["']([^"']+)["']\s*>\s*</a>"#).unwrap());
static HEADING_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}\s+(.*?)\s*\{#([A-Za-z0-9_:.\-]+)[^}]*\}\s*$").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());
static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)[^)]*\)").unwrap());
static BARE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>()\[\]"']+[^\s<>()\[\]"'.,;:]"#).unwrap());
static EMPHASIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`]+").unwrap());
static AUTOLINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(https?://[^>\s]+)>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// One bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    #[serde(skip)]
    pub id: String,
    /// Plain text with markdown removed.
    pub text: String,
    /// URLs in order of appearance, deduplicated.
    pub urls: Vec<String>,
}

struct Pending {
    id: String,
    lines: Vec<String>,
}

/// Parse the references document. Duplicate ids keep the first entry.
pub fn extract_references(text: &str) -> Vec<Reference> {
    let body = qmd::strip_front_matter(text);
    let mut out: Vec<Reference> = Vec::new();
    let mut current: Option<Pending> = None;

    for line in body.lines() {
        let trimmed = line.trim();
        if let Some(cap) = ANCHOR_RE.captures(trimmed) {
            flush(&mut current, &mut out);
            let rest = ANCHOR_RE.replace(trimmed, "").trim().to_string();
            current = Some(Pending {
                id: cap[1].to_string(),
                lines: if rest.is_empty() { Vec::new() } else { vec![rest] },
            });
            continue;
        }
        if let Some(cap) = HEADING_ID_RE.captures(trimmed) {
            flush(&mut current, &mut out);
            let title = cap[1].trim().to_string();
            current = Some(Pending {
                id: cap[2].to_string(),
                lines: if title.is_empty() { Vec::new() } else { vec![title] },
            });
            continue;
        }
        if HEADING_RE.is_match(trimmed) {
            flush(&mut current, &mut out);
            continue;
        }
        if let Some(ref mut pending) = current {
            if !trimmed.is_empty() {
                pending.lines.push(trimmed.to_string());
            }
        }
    }
    flush(&mut current, &mut out);
    out
}

fn flush(current: &mut Option<Pending>, out: &mut Vec<Reference>) {
    let Some(pending) = current.take() else { return };
    if out.iter().any(|r| r.id == pending.id) {
        warn!(id = %pending.id, "duplicate reference id, keeping the first");
        return;
    }
    let raw = pending.lines.join(" ");
    out.push(Reference {
        id: pending.id,
        text: plain_text(&raw),
        urls: collect_urls(&raw),
    });
}

fn collect_urls(raw: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: &str| {
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    };
    for cap in MD_LINK_RE.captures_iter(raw) {
        let target = &cap[2];
        if target.starts_with("http://") || target.starts_with("https://") {
            push(target);
        }
    }
    let without_links = MD_LINK_RE.replace_all(raw, "$1");
    for m in BARE_URL_RE.find_iter(&without_links) {
        push(m.as_str());
    }
    urls
}

fn plain_text(raw: &str) -> String {
    let text = MD_LINK_RE.replace_all(raw, "$1");
    let text = AUTOLINK_RE.replace_all(&text, "$1");
    let text = TAG_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Write `refs` as a JSON object keyed by id, sorted, pretty-printed.
pub fn write_references_json(refs: &[Reference], path: &Path) -> Result<WriteStatus, ExportError> {
    let by_id: BTreeMap<&str, &Reference> = refs.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut json = serde_json::to_string_pretty(&by_id).map_err(|e| ExportError::Serialize {
        what: "references".to_string(),
        message: e.to_string(),
    })?;
    json.push('\n');
    let status = write_if_changed(path, &json)?;
    info!(path = %path.display(), references = by_id.len(), ?status, "references file");
    Ok(status)
}

/// Set of reference ids, for citation checks.
pub fn reference_ids(refs: &[Reference]) -> FxHashSet<String> {
    refs.iter().map(|r| r.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFS: &str = r#"---
title: "References"
---

# References

<a id="sipri-2024"></a>
SIPRI. *Trends in World Military Expenditure, 2024*.
[sipri.org](https://www.sipri.org/fs-2504)

<a id="who-2023"></a>
**WHO** Global Health Estimates. https://www.who.int/data/gho.

### Lancet Commission {#lancet-2018}
See <https://doi.org/10.1016/x> for details.

<a id="sipri-2024"></a>
A duplicate that must be ignored.
"#;

    #[test]
    fn test_extract() {
        let refs = extract_references(REFS);
        let ids: Vec<_> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["sipri-2024", "who-2023", "lancet-2018"]);

        assert_eq!(
            refs[0].text,
            "SIPRI. Trends in World Military Expenditure, 2024. sipri.org"
        );
        assert_eq!(refs[0].urls, ["https://www.sipri.org/fs-2504"]);
        assert_eq!(refs[1].text, "WHO Global Health Estimates. https://www.who.int/data/gho.");
        assert_eq!(refs[1].urls, ["https://www.who.int/data/gho"]);
        assert!(refs[2].text.starts_with("Lancet Commission See"));
        assert_eq!(refs[2].urls, ["https://doi.org/10.1016/x"]);
    }

    #[test]
    fn test_write_sorted_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("references.json");
        let refs = extract_references(REFS);
        assert_eq!(write_references_json(&refs, &path).unwrap(), WriteStatus::Written);
        assert_eq!(write_references_json(&refs, &path).unwrap(), WriteStatus::Unchanged);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["lancet-2018", "sipri-2024", "who-2023"]);
        assert_eq!(value["who-2023"]["urls"][0], "https://www.who.int/data/gho");
    }
}
