//! Parameter usage audit: which parameters the book cites through
//! variables, which it never cites, and where it types a parameter's
//! value by hand instead.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use dih_core::constants::GENERATED_HEADER;
use dih_params::export::{CI_SUFFIX, RAW_SUFFIX};
use dih_params::{detect_unit_kind, format_parameter_value, ParameterRegistry, UnitKind};

use crate::qmd;
use crate::scanner::SourceFile;

/// Values below this are too common to flag as hand-typed.
const HARDCODED_THRESHOLD: f64 = 1e6;

#[derive(Debug, Clone, Serialize)]
pub struct ParameterUsage {
    pub name: String,
    pub variable_key: String,
    pub count: usize,
    /// Files citing the parameter, sorted.
    pub files: Vec<String>,
}

/// A `{{< var >}}` key that matches no parameter.
#[derive(Debug, Clone, Serialize)]
pub struct UnknownVariable {
    pub name: String,
    pub file: String,
    pub line: usize,
}

/// A parameter's formatted value typed literally into prose.
#[derive(Debug, Clone, Serialize)]
pub struct HardcodedValue {
    pub parameter: String,
    pub display: String,
    pub file: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageAudit {
    pub files_scanned: usize,
    /// Every parameter, sorted by name.
    pub usages: Vec<ParameterUsage>,
    /// Parameters with no variable reference, sorted.
    pub unused: Vec<String>,
    pub unknown: Vec<UnknownVariable>,
    pub hardcoded: Vec<HardcodedValue>,
}

impl UsageAudit {
    pub fn has_findings(&self) -> bool {
        !self.unknown.is_empty() || !self.hardcoded.is_empty()
    }
}

#[derive(Default)]
struct DocumentUsage {
    refs: Vec<(String, usize)>,
    hardcoded: Vec<HardcodedValue>,
}

/// Audit `files` against `registry`. Generated files (the appendix) are
/// skipped.
pub fn audit_usage(registry: &ParameterRegistry, files: &[SourceFile]) -> UsageAudit {
    let candidates = hardcoded_candidates(registry);
    let documents: Vec<&SourceFile> = files
        .iter()
        .filter(|f| !f.content.contains(GENERATED_HEADER))
        .collect();

    let per_file: Vec<(&SourceFile, DocumentUsage)> = documents
        .par_iter()
        .map(|file| (*file, scan_document(file, &candidates)))
        .collect();

    let mut usage: BTreeMap<String, (usize, Vec<String>)> = registry
        .iter()
        .map(|p| (p.name.clone(), (0, Vec::new())))
        .collect();
    let mut audit = UsageAudit {
        files_scanned: documents.len(),
        ..Default::default()
    };

    for (file, doc) in per_file {
        for (key, line) in doc.refs {
            match resolve_key(registry, &key) {
                Some(name) => {
                    if let Some(entry) = usage.get_mut(name) {
                        entry.0 += 1;
                        if !entry.1.contains(&file.rel_path) {
                            entry.1.push(file.rel_path.clone());
                        }
                    }
                }
                None => audit.unknown.push(UnknownVariable {
                    name: key,
                    file: file.rel_path.clone(),
                    line,
                }),
            }
        }
        audit.hardcoded.extend(doc.hardcoded);
    }

    for (name, (count, mut files)) in usage {
        files.sort();
        if count == 0 {
            audit.unused.push(name.clone());
        }
        let variable_key = name.to_ascii_lowercase();
        audit.usages.push(ParameterUsage {
            name,
            variable_key,
            count,
            files,
        });
    }
    audit
        .hardcoded
        .sort_by(|a, b| (&a.parameter, &a.file, a.line).cmp(&(&b.parameter, &b.file, b.line)));

    info!(
        files = audit.files_scanned,
        parameters = registry.len(),
        unused = audit.unused.len(),
        unknown = audit.unknown.len(),
        hardcoded = audit.hardcoded.len(),
        "parameter usage audit complete"
    );
    audit
}

/// Parameter name for a variable key, counting `_raw`/`_ci` variants
/// toward their base parameter.
fn resolve_key<'r>(registry: &'r ParameterRegistry, key: &str) -> Option<&'r str> {
    if let Some(p) = registry.by_variable_key(key) {
        return Some(p.name.as_str());
    }
    [RAW_SUFFIX, CI_SUFFIX]
        .iter()
        .filter_map(|suffix| key.strip_suffix(suffix))
        .find_map(|base| registry.by_variable_key(base))
        .map(|p| p.name.as_str())
}

/// Display strings worth searching for, first parameter wins on ties.
fn hardcoded_candidates(registry: &ParameterRegistry) -> Vec<(String, String)> {
    let mut seen = BTreeMap::new();
    for param in registry.iter() {
        let kind = detect_unit_kind(&param.unit);
        if !matches!(kind, UnitKind::Currency | UnitKind::Count) {
            continue;
        }
        if param.value.abs() < HARDCODED_THRESHOLD {
            continue;
        }
        let display = format_parameter_value(param.value, &param.unit);
        seen.entry(display).or_insert_with(|| param.name.clone());
    }
    seen.into_iter().map(|(display, name)| (name, display)).collect()
}

fn scan_document(file: &SourceFile, candidates: &[(String, String)]) -> DocumentUsage {
    let refs = qmd::variable_refs(&file.content)
        .into_iter()
        .map(|v| (v.name, v.line))
        .collect();

    let masked = qmd::mask_code(&file.content);
    let mut hardcoded = Vec::new();
    for (name, display) in candidates {
        for (at, _) in masked.match_indices(display.as_str()) {
            if !standalone(&masked, at, display.len()) {
                continue;
            }
            hardcoded.push(HardcodedValue {
                parameter: name.clone(),
                display: display.clone(),
                file: file.rel_path.clone(),
                line: qmd::line_at(&masked, at),
            });
        }
    }
    DocumentUsage { refs, hardcoded }
}

/// Not part of a longer number or word.
fn standalone(text: &str, at: usize, len: usize) -> bool {
    let before = text[..at].chars().next_back();
    let after = text[at + len..].chars().next();
    let joins_before = before.is_some_and(|c| c.is_ascii_digit() || c == '.' || c == ',' || c == '$');
    let joins_after = after.is_some_and(|c| c.is_alphanumeric());
    !joins_before && !joins_after
}

#[cfg(test)]
mod tests {
    use super::*;
    use dih_params::{DerivedMeta, Parameter, RegistryBuilder};

    fn registry() -> ParameterRegistry {
        let mut b = RegistryBuilder::new();
        b.define(Parameter::new("MILITARY_SPENDING", 2.718e12, "USD/year")).unwrap();
        b.define(Parameter::new("CONFLICT_DEATHS", 55_000_000.0, "deaths")).unwrap();
        b.define(Parameter::new("REDUCTION", 0.01, "rate")).unwrap();
        b.define_derived(
            "TREATY_FUNDING",
            "MILITARY_SPENDING * REDUCTION",
            DerivedMeta {
                unit: "USD/year".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        b.build()
    }

    fn file(rel: &str, content: &str) -> SourceFile {
        SourceFile::new(rel, format!("/book/{rel}"), content)
    }

    #[test]
    fn test_counts_unused_and_variants() {
        let files = [
            file(
                "a.qmd",
                "{{< var military_spending >}} and {{< var military_spending_raw >}}\n",
            ),
            file("b.qmd", "{{< var treaty_funding_ci >}} {{< var nope >}}\n"),
        ];
        let audit = audit_usage(&registry(), &files);

        let spending = audit.usages.iter().find(|u| u.name == "MILITARY_SPENDING").unwrap();
        assert_eq!(spending.count, 2);
        assert_eq!(spending.files, ["a.qmd"]);
        assert_eq!(audit.unused, ["CONFLICT_DEATHS", "REDUCTION"]);
        assert_eq!(audit.unknown.len(), 1);
        assert_eq!(audit.unknown[0].name, "nope");

        let names: Vec<_> = audit.usages.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            ["CONFLICT_DEATHS", "MILITARY_SPENDING", "REDUCTION", "TREATY_FUNDING"]
        );
    }

    #[test]
    fn test_hardcoded_values() {
        let files = [file(
            "war.qmd",
            "Spending hit $2.72T.\nSome 55 million died, not 155 million.\nRate 1% is fine.\n`$27.18B` in code is fine.\n",
        )];
        let audit = audit_usage(&registry(), &files);
        let found: Vec<_> = audit
            .hardcoded
            .iter()
            .map(|h| (h.parameter.as_str(), h.line))
            .collect();
        assert_eq!(found, [("CONFLICT_DEATHS", 2), ("MILITARY_SPENDING", 1)]);
        assert!(audit.has_findings());
    }

    #[test]
    fn test_generated_files_skipped() {
        let files = [file("appendix.qmd", &format!("<!-- {GENERATED_HEADER} -->\n$2.72T\n"))];
        let audit = audit_usage(&registry(), &files);
        assert_eq!(audit.files_scanned, 0);
        assert!(audit.hardcoded.is_empty());
    }
}
