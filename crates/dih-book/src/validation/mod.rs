//! Book validation: source checks before rendering, output checks after.

pub mod findings;
pub mod post_render;
pub mod pre_render;

pub use findings::{Finding, Severity, ValidationReport};
pub use post_render::PostRenderValidator;
pub use pre_render::{variable_keys, PreRenderValidator};
