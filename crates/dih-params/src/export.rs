//! Generated artifacts derived from the registry: the Quarto variables
//! file and the parameter appendix.

use std::fmt::Write as _;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::info;

use dih_core::constants::GENERATED_HEADER;
use dih_core::errors::ExportError;

use crate::formatting::{format_confidence_interval, format_parameter_value};
use crate::model::{Parameter, SourceType};
use crate::registry::ParameterRegistry;

/// Whether a generated file actually changed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Unchanged,
}

/// Suffix for the raw numeric variable of a parameter.
pub const RAW_SUFFIX: &str = "_raw";
/// Suffix for the formatted confidence-interval variable.
pub const CI_SUFFIX: &str = "_ci";

/// Build the Quarto variables mapping in definition order:
/// `key` → display string, `key_raw` → number, `key_ci` → range.
pub fn variables_document(registry: &ParameterRegistry) -> Mapping {
    let mut map = Mapping::new();
    for param in registry.iter() {
        let key = param.variable_key();
        map.insert(
            Value::String(key.clone()),
            Value::String(format_parameter_value(param.value, &param.unit)),
        );
        map.insert(Value::String(format!("{key}{RAW_SUFFIX}")), raw_value(param.value));
        if let Some(ci) = format_confidence_interval(param) {
            map.insert(Value::String(format!("{key}{CI_SUFFIX}")), Value::String(ci));
        }
    }
    map
}

/// Serialized variables file, header comment included.
pub fn render_variables(registry: &ParameterRegistry) -> Result<String, ExportError> {
    let body = serde_yaml::to_string(&variables_document(registry)).map_err(|e| {
        ExportError::Serialize {
            what: "variables".to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(format!("# {GENERATED_HEADER}\n{body}"))
}

/// Write the variables file, leaving it untouched when nothing changed.
pub fn write_variables_file(
    registry: &ParameterRegistry,
    path: &Path,
) -> Result<WriteStatus, ExportError> {
    let content = render_variables(registry)?;
    let status = write_if_changed(path, &content)?;
    info!(path = %path.display(), variables = registry.len(), ?status, "variables file");
    Ok(status)
}

/// Atomically replace `path` with `content` unless it already holds it.
pub fn write_if_changed(path: &Path, content: &str) -> Result<WriteStatus, ExportError> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == content {
            return Ok(WriteStatus::Unchanged);
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "generated".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&tmp, content).map_err(|source| ExportError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(WriteStatus::Written)
}

fn raw_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::Number((value as i64).into())
    } else {
        Value::Number(value.into())
    }
}

/// Generate the "Parameters and Calculations" appendix as QMD.
///
/// `references_href` is the path from the appendix to the bibliography
/// page, e.g. `../references.qmd`.
pub fn reference_appendix(registry: &ParameterRegistry, references_href: &str) -> String {
    let mut out = String::new();
    out.push_str("---\ntitle: \"Parameters and Calculations\"\n---\n\n");
    let _ = writeln!(out, "<!-- {GENERATED_HEADER} -->\n");
    let _ = writeln!(
        out,
        "This appendix lists every number used in the book, where it comes from, \
         and how derived values are calculated.\n"
    );

    for (source_type, heading) in [
        (SourceType::External, "External Data Sources"),
        (SourceType::Calculated, "Calculated Values"),
        (SourceType::Definition, "Core Definitions"),
    ] {
        let section: Vec<&Parameter> = registry
            .iter()
            .filter(|p| p.source_type == source_type)
            .collect();
        if section.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {heading} ({})\n", section.len());
        for param in section {
            write_entry(&mut out, registry, param, references_href);
        }
    }
    out
}

fn write_entry(out: &mut String, registry: &ParameterRegistry, param: &Parameter, references_href: &str) {
    let key = param.variable_key();
    let _ = writeln!(out, "### {} {{#sec-{}}}\n", param.label(), key.replace('_', "-"));
    let _ = writeln!(
        out,
        "**Value:** {}  ",
        format_parameter_value(param.value, &param.unit)
    );
    if !param.unit.is_empty() {
        let _ = writeln!(out, "**Unit:** {}  ", param.unit);
    }
    if let Some(ref source) = param.source {
        let _ = writeln!(out, "**Source:** [{}]({references_href}#{})  ", source.id, source.id);
    }
    if let Some(ci) = format_confidence_interval(param) {
        let _ = writeln!(out, "**95% CI:** {ci}  ");
    }
    if let Some(ref formula) = param.formula {
        let _ = writeln!(out, "**Formula:** `{formula}`  ");
    }
    if !param.inputs.is_empty() {
        let links: Vec<String> = param
            .inputs
            .iter()
            .map(|input| match registry.get(input) {
                Some(p) => format!(
                    "[{}](#sec-{})",
                    p.label(),
                    p.variable_key().replace('_', "-")
                ),
                None => format!("`{input}`"),
            })
            .collect();
        let _ = writeln!(out, "**Inputs:** {}  ", links.join(", "));
    }
    out.push('\n');
    if let Some(ref latex) = param.latex {
        let _ = writeln!(out, "$$\n{latex}\n$$\n");
    }
    if !param.description.is_empty() {
        let _ = writeln!(out, "{}\n", param.description.trim());
    }
}
