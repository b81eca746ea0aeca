//! Loading a parameter table from disk and exporting it.

use dih_params::export::{render_variables, write_variables_file, WriteStatus};
use dih_core::errors::ParameterError;
use dih_params::{load_registry, parse_registry, SourceType};

const TABLE: &str = r#"
[[parameter]]
name = "GLOBAL_MILITARY_SPENDING_2024"
value = 2_718_000_000_000
unit = "USD/year"
source = "sipri-2024"
keywords = ["military", "spending"]
description = "World military expenditure in 2024."
confidence_interval = [2_600_000_000_000, 2_800_000_000_000]

[[parameter]]
name = "TREATY_REDUCTION_PCT"
value = 0.01
unit = "rate"
source_type = "definition"

[[parameter]]
name = "TREATY_ANNUAL_FUNDING"
formula = "GLOBAL_MILITARY_SPENDING_2024 * TREATY_REDUCTION_PCT"
unit = "USD/year"
latex = "F = S \\times r"
"#;

#[test]
fn test_load_and_write_variables() {
    let dir = tempfile::TempDir::new().unwrap();
    let table = dir.path().join("parameters.toml");
    std::fs::write(&table, TABLE).unwrap();

    let registry = load_registry(&table).unwrap();
    assert_eq!(registry.len(), 3);
    let funding = registry.get("TREATY_ANNUAL_FUNDING").unwrap();
    assert_eq!(funding.source_type, SourceType::Calculated);
    assert!((funding.value - 27_180_000_000.0).abs() < 1.0);

    let out = dir.path().join("_variables.yml");
    assert_eq!(write_variables_file(&registry, &out).unwrap(), WriteStatus::Written);
    assert_eq!(write_variables_file(&registry, &out).unwrap(), WriteStatus::Unchanged);

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("# AUTO-GENERATED"));
    let parsed: serde_yaml::Mapping = serde_yaml::from_str(&text).unwrap();
    assert_eq!(
        parsed.get("treaty_annual_funding").and_then(|v| v.as_str()),
        Some("$27.18B")
    );
    assert_eq!(
        parsed.get("global_military_spending_2024_ci").and_then(|v| v.as_str()),
        Some("$2.6T–$2.8T")
    );
    assert_eq!(
        parsed.get("treaty_reduction_pct").and_then(|v| v.as_str()),
        Some("1%")
    );
    assert_eq!(text, render_variables(&registry).unwrap());
    // no temp file left behind
    assert!(!dir.path().join("._variables.yml.tmp").exists());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = load_registry(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ParameterError::Io { .. }));
}

#[test]
fn test_calculated_entry_needs_formula() {
    let table = r#"
[[parameter]]
name = "QALYS_GAINED"
value = 1_000
unit = "QALY"
source_type = "calculated"
"#;
    let err = parse_registry(table, "parameters.toml").unwrap_err();
    assert!(matches!(err, ParameterError::MissingFormula { ref name } if name == "QALYS_GAINED"));
    assert!(err.to_string().contains("QALYS_GAINED"));
}
