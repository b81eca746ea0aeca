//! `dih params`: look up and format registry values.

use std::fmt::Write as _;

use clap::Subcommand;
use serde::Serialize;

use dih_params::{format_confidence_interval, format_parameter_value, Parameter, ParameterRegistry};

use super::Context;

#[derive(Subcommand, Debug)]
pub(crate) enum ParamsCommand {
    /// List parameters in definition order
    List {
        /// Only parameters tagged with this keyword
        #[arg(long)]
        keyword: Option<String>,
    },

    /// Show one parameter with its provenance
    Show {
        /// Parameter name, e.g. GLOBAL_MILITARY_SPENDING_2024
        name: String,
    },

    /// Format a number the way the book displays it
    Format {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// Unit string, e.g. `USD`, `deaths`, `%`, `years`
        #[arg(default_value = "")]
        unit: String,
    },
}

#[derive(Serialize)]
struct ParameterRow<'a> {
    name: &'a str,
    variable: String,
    value: f64,
    display: String,
    unit: &'a str,
    source_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence_interval: Option<String>,
}

impl<'a> ParameterRow<'a> {
    fn new(param: &'a Parameter) -> Self {
        Self {
            name: &param.name,
            variable: param.variable_key(),
            value: param.value,
            display: format_parameter_value(param.value, &param.unit),
            unit: &param.unit,
            source_type: param.source_type.label(),
            source: param.source.as_ref().map(|s| s.id.as_str()),
            confidence_interval: format_confidence_interval(param),
        }
    }
}

#[derive(Serialize)]
struct ParameterDetail<'a> {
    #[serde(flatten)]
    row: ParameterRow<'a>,
    label: String,
    description: &'a str,
    keywords: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    formula: Option<&'a str>,
    inputs: &'a [String],
    used_by: Vec<&'a str>,
}

pub(crate) fn run(ctx: &Context, cmd: ParamsCommand) -> anyhow::Result<bool> {
    match cmd {
        ParamsCommand::Format { value, unit } => {
            println!("{}", format_parameter_value(value, &unit));
            Ok(true)
        }
        ParamsCommand::List { keyword } => {
            let registry = ctx.book.load_registry()?;
            let params: Vec<&Parameter> = match keyword {
                Some(ref k) => registry.by_keyword(k).collect(),
                None => registry.iter().collect(),
            };
            let rows: Vec<ParameterRow<'_>> = params.iter().map(|p| ParameterRow::new(p)).collect();
            ctx.emit(&rows, || list_table(&rows))?;
            Ok(true)
        }
        ParamsCommand::Show { name } => {
            let registry = ctx.book.load_registry()?;
            let param = registry.require(&name.to_ascii_uppercase())?;
            let detail = detail(&registry, param);
            ctx.emit(&detail, || show_text(&detail))?;
            Ok(true)
        }
    }
}

fn detail<'a>(registry: &'a ParameterRegistry, param: &'a Parameter) -> ParameterDetail<'a> {
    ParameterDetail {
        row: ParameterRow::new(param),
        label: param.label(),
        description: param.description.trim(),
        keywords: &param.keywords,
        formula: param.formula.as_deref(),
        inputs: &param.inputs,
        used_by: registry
            .dependents_of(&param.name)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect(),
    }
}

fn list_table(rows: &[ParameterRow<'_>]) -> String {
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:>14}  {:<12}  SOURCE", "NAME", "VALUE", "TYPE");
    for r in rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:>14}  {:<12}  {}",
            r.name,
            r.display,
            r.source_type,
            r.source.unwrap_or("-")
        );
    }
    let _ = writeln!(out, "\n{} parameter(s)", rows.len());
    out
}

fn show_text(d: &ParameterDetail<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", d.row.name, d.label);
    let _ = writeln!(out, "  value:     {} ({})", d.row.display, d.row.value);
    if !d.row.unit.is_empty() {
        let _ = writeln!(out, "  unit:      {}", d.row.unit);
    }
    let _ = writeln!(out, "  variable:  {{{{< var {} >}}}}", d.row.variable);
    let _ = writeln!(out, "  type:      {}", d.row.source_type);
    if let Some(source) = d.row.source {
        let _ = writeln!(out, "  source:    {source}");
    }
    if let Some(ref ci) = d.row.confidence_interval {
        let _ = writeln!(out, "  95% CI:    {ci}");
    }
    if let Some(formula) = d.formula {
        let _ = writeln!(out, "  formula:   {formula}");
    }
    if !d.inputs.is_empty() {
        let _ = writeln!(out, "  inputs:    {}", d.inputs.join(", "));
    }
    if !d.used_by.is_empty() {
        let _ = writeln!(out, "  used by:   {}", d.used_by.join(", "));
    }
    if !d.keywords.is_empty() {
        let _ = writeln!(out, "  keywords:  {}", d.keywords.join(", "));
    }
    if !d.description.is_empty() {
        let _ = writeln!(out, "\n{}", d.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dih_params::RegistryBuilder;

    fn registry() -> ParameterRegistry {
        let mut b = RegistryBuilder::new();
        b.define(
            Parameter::new("MILITARY_SPENDING", 2.718e12, "USD/year")
                .with_source("sipri-2024")
                .with_description("World military expenditure.")
                .with_keywords(["military"]),
        )
        .unwrap();
        b.build()
    }

    #[test]
    fn test_list_table() {
        let registry = registry();
        let rows: Vec<_> = registry.iter().map(ParameterRow::new).collect();
        let table = list_table(&rows);
        assert!(table.starts_with("NAME"));
        assert!(table.contains("$2.72T"));
        assert!(table.contains("sipri-2024"));
        assert!(table.ends_with("1 parameter(s)\n"));
    }

    #[test]
    fn test_show_text() {
        let registry = registry();
        let param = registry.require("MILITARY_SPENDING").unwrap();
        let text = show_text(&detail(&registry, param));
        assert!(text.starts_with("MILITARY_SPENDING (Military Spending)\n"));
        assert!(text.contains("{{< var military_spending >}}"));
        assert!(text.contains("keywords:  military"));
        assert!(text.ends_with("\nWorld military expenditure.\n"));
    }
}
