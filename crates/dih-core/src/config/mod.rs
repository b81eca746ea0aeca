//! Configuration system.
//! TOML-based, layered resolution: CLI > env > project > user > defaults.

pub mod book_config;
pub mod dih_config;
pub mod narration_config;
pub mod render_config;
pub mod validation_config;

pub use book_config::BookConfig;
pub use dih_config::{CliOverrides, DihConfig};
pub use narration_config::NarrationConfig;
pub use render_config::RenderConfig;
pub use validation_config::ValidationConfig;
