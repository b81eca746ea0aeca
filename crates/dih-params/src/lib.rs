//! dih-params: the single source of truth for the book's numbers.
//!
//! - Model: `Parameter` with provenance (source, confidence interval, keywords)
//! - Formula: arithmetic expressions for derived parameters
//! - Registry: definition-ordered, frozen parameter table
//! - Loader: `parameters.toml` → registry
//! - Formatting: unit detection and human-readable value strings
//! - Export: Quarto `_variables.yml` and the parameter appendix

pub mod export;
pub mod formatting;
pub mod formula;
pub mod loader;
pub mod model;
pub mod registry;

pub use formatting::{
    detect_unit_kind, format_confidence_interval, format_currency, format_multiplier,
    format_number, format_parameter_value, format_percentage, UnitKind,
};
pub use loader::{load_registry, parse_registry};
pub use model::{Parameter, SourceRef, SourceType};
pub use registry::{DerivedMeta, ParameterRegistry, RegistryBuilder};
