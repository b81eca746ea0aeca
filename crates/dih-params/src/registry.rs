//! Definition-ordered parameter table.
//!
//! Parameters are defined once, in order. Derived parameters are
//! evaluated eagerly at definition time and may only reference
//! parameters defined before them, so the table never contains a cycle.
//! `build()` freezes the table; a `ParameterRegistry` is read-only.

use rustc_hash::FxHashMap;
use tracing::debug;

use dih_core::errors::ParameterError;

use crate::formula::{self, EvalError};
use crate::model::{is_valid_name, Parameter, SourceRef, SourceType};

/// Metadata for a derived parameter; the value and inputs come from the formula.
#[derive(Debug, Clone, Default)]
pub struct DerivedMeta {
    pub unit: String,
    pub display_name: Option<String>,
    pub description: String,
    pub source: Option<SourceRef>,
    pub confidence_interval: Option<(f64, f64)>,
    pub keywords: Vec<String>,
    pub latex: Option<String>,
}

/// Mutable builder used while the table is being defined.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    params: Vec<Parameter>,
    index: FxHashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. A parameter carrying a formula is treated as
    /// derived: its inputs and value are recomputed from the formula.
    pub fn define(&mut self, mut param: Parameter) -> Result<&Parameter, ParameterError> {
        if !is_valid_name(&param.name) {
            return Err(ParameterError::InvalidName { name: param.name });
        }
        if self.index.contains_key(&param.name) {
            return Err(ParameterError::Duplicate { name: param.name });
        }
        if param.source_type == SourceType::Calculated && !param.is_derived() {
            return Err(ParameterError::MissingFormula { name: param.name });
        }
        if let Some((low, high)) = param.confidence_interval {
            if !low.is_finite() || !high.is_finite() {
                return Err(ParameterError::NonFinite {
                    name: param.name,
                    message: format!("confidence interval is ({low}, {high})"),
                });
            }
            if low > high {
                return Err(ParameterError::InvalidInterval {
                    name: param.name,
                    low,
                    high,
                });
            }
        }

        if let Some(ref src) = param.formula {
            let (value, inputs) = self.evaluate(&param.name, src)?;
            param.value = value;
            param.inputs = inputs;
            param.source_type = SourceType::Calculated;
            debug!(name = %param.name, value, "derived parameter");
        } else if !param.value.is_finite() {
            return Err(ParameterError::NonFinite {
                name: param.name.clone(),
                message: format!("value is {}", param.value),
            });
        }

        let slot = self.params.len();
        self.index.insert(param.name.clone(), slot);
        self.params.push(param);
        Ok(&self.params[slot])
    }

    /// Define a derived parameter from `formula`, evaluated now against the
    /// parameters already defined.
    pub fn define_derived(
        &mut self,
        name: impl Into<String>,
        formula: impl Into<String>,
        meta: DerivedMeta,
    ) -> Result<&Parameter, ParameterError> {
        let mut param = Parameter::new(name, 0.0, meta.unit)
            .with_description(meta.description)
            .with_source_type(SourceType::Calculated)
            .with_keywords(meta.keywords);
        param.display_name = meta.display_name;
        param.source = meta.source;
        param.confidence_interval = meta.confidence_interval;
        param.formula = Some(formula.into());
        param.latex = meta.latex;
        self.define(param)
    }

    /// Current value of an already-defined parameter.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.params[i].value)
    }

    fn evaluate(&self, name: &str, src: &str) -> Result<(f64, Vec<String>), ParameterError> {
        let expr = formula::parse(src).map_err(|e| ParameterError::FormulaSyntax {
            name: name.to_string(),
            position: e.position,
            message: e.message,
        })?;
        let inputs = expr.identifiers();
        for input in &inputs {
            if !self.index.contains_key(input) {
                return Err(ParameterError::UndefinedInput {
                    name: name.to_string(),
                    input: input.clone(),
                });
            }
        }
        let value = expr
            .eval(&|ident| self.value_of(ident))
            .map_err(|e| match e {
                EvalError::UnknownIdentifier(input) => ParameterError::UndefinedInput {
                    name: name.to_string(),
                    input,
                },
                other => ParameterError::NonFinite {
                    name: name.to_string(),
                    message: other.to_string(),
                },
            })?;
        Ok((value, inputs))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Freeze the table.
    pub fn build(self) -> ParameterRegistry {
        ParameterRegistry {
            params: self.params,
            index: self.index,
        }
    }
}

/// Immutable parameter table in definition order.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    params: Vec<Parameter>,
    index: FxHashMap<String, usize>,
}

impl ParameterRegistry {
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Like [`get`](Self::get) but an error for unknown names.
    pub fn require(&self, name: &str) -> Result<&Parameter, ParameterError> {
        self.get(name).ok_or_else(|| ParameterError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Parameters in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters tagged with `keyword` (case-insensitive).
    pub fn by_keyword<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Parameter> + 'a {
        self.params
            .iter()
            .filter(move |p| p.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)))
    }

    /// Derived parameters that use `name` directly as an input.
    pub fn dependents_of(&self, name: &str) -> Vec<&Parameter> {
        self.params
            .iter()
            .filter(|p| p.inputs.iter().any(|i| i == name))
            .collect()
    }

    /// Lookup by Quarto variable key (lower-cased name).
    pub fn by_variable_key(&self, key: &str) -> Option<&Parameter> {
        self.get(&key.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RegistryBuilder {
        let mut b = RegistryBuilder::new();
        b.define(
            Parameter::new("GLOBAL_MILITARY_SPENDING", 2.718e12, "USD/year")
                .with_source("sipri-2024")
                .with_keywords(["military", "spending"]),
        )
        .unwrap();
        b.define(Parameter::new("TREATY_REDUCTION_PCT", 0.01, "rate").with_source_type(SourceType::Definition))
            .unwrap();
        b
    }

    #[test]
    fn test_derived_evaluated_eagerly() {
        let mut b = sample();
        let p = b
            .define_derived(
                "TREATY_ANNUAL_FUNDING",
                "GLOBAL_MILITARY_SPENDING * TREATY_REDUCTION_PCT",
                DerivedMeta {
                    unit: "USD/year".to_string(),
                    description: "Funding freed by the treaty.".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!((p.value - 2.718e10).abs() < 1.0);
        assert!(p.is_derived());
        assert_eq!(p.description, "Funding freed by the treaty.");
        assert_eq!(p.inputs, vec!["GLOBAL_MILITARY_SPENDING", "TREATY_REDUCTION_PCT"]);
        assert_eq!(p.source_type, SourceType::Calculated);

        let reg = b.build();
        assert_eq!(reg.len(), 3);
        let names: Vec<_> = reg.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["GLOBAL_MILITARY_SPENDING", "TREATY_REDUCTION_PCT", "TREATY_ANNUAL_FUNDING"]
        );
        assert_eq!(reg.dependents_of("TREATY_REDUCTION_PCT").len(), 1);
        assert_eq!(reg.by_keyword("MILITARY").count(), 1);
        assert!(reg.by_variable_key("treaty_annual_funding").is_some());
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut b = sample();
        let err = b
            .define_derived("LATER_TOTAL", "NOT_YET_DEFINED * 2", DerivedMeta::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ParameterError::UndefinedInput { ref input, .. } if input == "NOT_YET_DEFINED"
        ));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let mut b = sample();
        assert!(matches!(
            b.define(Parameter::new("GLOBAL_MILITARY_SPENDING", 1.0, "")),
            Err(ParameterError::Duplicate { .. })
        ));
        assert!(matches!(
            b.define(Parameter::new("lowercase", 1.0, "")),
            Err(ParameterError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let mut b = RegistryBuilder::new();
        let err = b
            .define(Parameter::new("COST", 10.0, "USD").with_confidence_interval(12.0, 8.0))
            .unwrap_err();
        assert!(matches!(err, ParameterError::InvalidInterval { .. }));
    }

    #[test]
    fn test_non_finite_interval_rejected() {
        let mut b = RegistryBuilder::new();
        let err = b
            .define(Parameter::new("COST", 10.0, "USD").with_confidence_interval(f64::NAN, 12.0))
            .unwrap_err();
        assert!(matches!(err, ParameterError::NonFinite { .. }));
        let err = b
            .define(Parameter::new("COST", 10.0, "USD").with_confidence_interval(8.0, f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, ParameterError::NonFinite { .. }));
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn test_deeply_nested_formula_is_syntax_error() {
        let mut b = RegistryBuilder::new();
        let formula = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        let err = b.define_derived("DEEP", formula, DerivedMeta::default()).unwrap_err();
        assert!(matches!(err, ParameterError::FormulaSyntax { .. }));
    }

    #[test]
    fn test_calculated_without_formula_rejected() {
        let mut b = RegistryBuilder::new();
        let err = b
            .define(Parameter::new("TOTAL", 5.0, "USD").with_source_type(SourceType::Calculated))
            .unwrap_err();
        assert!(matches!(err, ParameterError::MissingFormula { ref name } if name == "TOTAL"));
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let mut b = RegistryBuilder::new();
        b.define(Parameter::new("ZERO", 0.0, "")).unwrap();
        let err = b
            .define_derived("BROKEN", "1 / ZERO", DerivedMeta::default())
            .unwrap_err();
        assert!(matches!(err, ParameterError::NonFinite { .. }));
    }

    #[test]
    fn test_require_unknown() {
        let reg = sample().build();
        assert!(matches!(
            reg.require("MISSING"),
            Err(ParameterError::NotFound { .. })
        ));
    }
}
