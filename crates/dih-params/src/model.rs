//! The Parameter: a named, provenance-tagged numeric fact.

use serde::{Deserialize, Serialize};

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Taken from a cited external source.
    #[default]
    External,
    /// Computed from other parameters.
    Calculated,
    /// A modelling choice or definition made by the authors.
    Definition,
}

impl SourceType {
    pub fn label(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Calculated => "calculated",
            Self::Definition => "definition",
        }
    }
}

/// Citation pointing into the bibliography.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Anchor id in `references.qmd`.
    pub id: String,
    /// Direct URL when the reference entry has one worth repeating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A named numeric fact used throughout the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// `UPPER_SNAKE_CASE` identifier, unique within a registry.
    pub name: String,
    pub value: f64,
    /// Free-form unit string (`USD`, `USD/year`, `deaths`, `%`, ...).
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub source_type: SourceType,
    /// 95% confidence interval as `(low, high)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Names of the parameters a derived value is computed from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// LaTeX rendering of the formula for the appendix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
}

impl Parameter {
    /// A bare external parameter; fill the rest with the `with_*` helpers.
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            display_name: None,
            description: String::new(),
            source: None,
            source_type: SourceType::External,
            confidence_interval: None,
            keywords: Vec::new(),
            inputs: Vec::new(),
            formula: None,
            latex: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source(mut self, id: impl Into<String>) -> Self {
        self.source = Some(SourceRef {
            id: id.into(),
            url: None,
        });
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_confidence_interval(mut self, low: f64, high: f64) -> Self {
        self.confidence_interval = Some((low, high));
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Key used for the Quarto variable: the lower-cased name.
    pub fn variable_key(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Human-readable label, falling back to a title-cased name.
    pub fn label(&self) -> String {
        if let Some(ref display) = self.display_name {
            return display.clone();
        }
        self.name
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let lower = w.to_ascii_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_derived(&self) -> bool {
        self.formula.is_some()
    }
}

/// `UPPER_SNAKE_CASE`: starts with a letter; letters, digits and single
/// underscores after that.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    !name.ends_with('_')
        && !name.contains("__")
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("GLOBAL_MILITARY_SPENDING_2024"));
        assert!(is_valid_name("X"));
        assert!(!is_valid_name("global_spending"));
        assert!(!is_valid_name("_LEADING"));
        assert!(!is_valid_name("TRAILING_"));
        assert!(!is_valid_name("DOUBLE__UNDERSCORE"));
        assert!(!is_valid_name("1PCT"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_label_and_key() {
        let p = Parameter::new("GLOBAL_DISEASE_DEATHS_ANNUAL", 55.0e6, "deaths");
        assert_eq!(p.label(), "Global Disease Deaths Annual");
        assert_eq!(p.variable_key(), "global_disease_deaths_annual");

        let mut named = p.clone();
        named.display_name = Some("Annual deaths from disease".to_string());
        assert_eq!(named.label(), "Annual deaths from disease");
    }
}
