//! Loads the parameter table from `parameters.toml`.
//!
//! ```toml
//! [[parameter]]
//! name = "GLOBAL_MILITARY_SPENDING_2024"
//! value = 2_718_000_000_000
//! unit = "USD/year"
//! source = "sipri-2024"
//! confidence_interval = [2.6e12, 2.8e12]
//! keywords = ["military"]
//!
//! [[parameter]]
//! name = "TREATY_ANNUAL_FUNDING"
//! formula = "GLOBAL_MILITARY_SPENDING_2024 * TREATY_REDUCTION_PCT"
//! unit = "USD/year"
//! ```
//!
//! Entries are defined in file order; an entry with `formula` is derived.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use dih_core::errors::ParameterError;

use crate::model::{Parameter, SourceRef, SourceType};
use crate::registry::{ParameterRegistry, RegistryBuilder};

#[derive(Debug, Deserialize)]
struct ParameterFile {
    #[serde(default)]
    parameter: Vec<RawParameter>,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    name: String,
    value: Option<f64>,
    formula: Option<String>,
    #[serde(default)]
    unit: String,
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    source: Option<String>,
    source_url: Option<String>,
    source_type: Option<SourceType>,
    confidence_interval: Option<(f64, f64)>,
    #[serde(default)]
    keywords: Vec<String>,
    latex: Option<String>,
}

impl RawParameter {
    fn into_parameter(self) -> Result<Parameter, ParameterError> {
        if self.value.is_none() && self.formula.is_none() {
            return Err(ParameterError::MissingValue { name: self.name });
        }
        let source_type = match (&self.formula, self.source_type) {
            (Some(_), _) => SourceType::Calculated,
            (None, Some(t)) => t,
            (None, None) => SourceType::External,
        };
        Ok(Parameter {
            name: self.name,
            value: self.value.unwrap_or(0.0),
            unit: self.unit,
            display_name: self.display_name,
            description: self.description,
            source: self.source.map(|id| SourceRef {
                id,
                url: self.source_url,
            }),
            source_type,
            confidence_interval: self.confidence_interval,
            keywords: self.keywords,
            inputs: Vec::new(),
            formula: self.formula,
            latex: self.latex,
        })
    }
}

/// Parse a parameter table from TOML text. `origin` names the source in errors.
pub fn parse_registry(text: &str, origin: &str) -> Result<ParameterRegistry, ParameterError> {
    let file: ParameterFile = toml::from_str(text).map_err(|e| ParameterError::Parse {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    let mut builder = RegistryBuilder::new();
    for raw in file.parameter {
        builder.define(raw.into_parameter()?)?;
    }
    Ok(builder.build())
}

/// Read and parse `path`.
pub fn load_registry(path: &Path) -> Result<ParameterRegistry, ParameterError> {
    let text = std::fs::read_to_string(path).map_err(|e| ParameterError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let registry = parse_registry(&text, &path.display().to_string())?;
    info!(path = %path.display(), count = registry.len(), "loaded parameter registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_in_file_order() {
        let reg = parse_registry(
            r#"
[[parameter]]
name = "A"
value = 2_000
unit = "USD"
source = "ref-a"
source_url = "https://example.org/a"

[[parameter]]
name = "B"
value = 0.5
source_type = "definition"

[[parameter]]
name = "C"
formula = "A * B"
unit = "USD"
"#,
            "<test>",
        )
        .unwrap();

        let c = reg.get("C").unwrap();
        assert_eq!(c.value, 1000.0);
        assert_eq!(c.source_type, SourceType::Calculated);
        assert_eq!(reg.get("B").unwrap().source_type, SourceType::Definition);
        assert_eq!(
            reg.get("A").unwrap().source.as_ref().unwrap().url.as_deref(),
            Some("https://example.org/a")
        );
    }

    #[test]
    fn test_missing_value_and_formula() {
        let err = parse_registry("[[parameter]]\nname = \"EMPTY\"\n", "<test>").unwrap_err();
        assert!(matches!(err, ParameterError::MissingValue { .. }));
    }

    #[test]
    fn test_bad_toml() {
        let err = parse_registry("[[parameter]\n", "params.toml").unwrap_err();
        match err {
            ParameterError::Parse { path, .. } => assert_eq!(path, "params.toml"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}
