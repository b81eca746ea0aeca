//! Error handling for the toolchain.
//! One error enum per subsystem, `thiserror` only.

pub mod book_error;
pub mod config_error;
pub mod error_code;
pub mod export_error;
pub mod parameter_error;
pub mod render_error;
pub mod scan_error;

pub use book_error::BookError;
pub use config_error::ConfigError;
pub use error_code::DihErrorCode;
pub use export_error::ExportError;
pub use parameter_error::ParameterError;
pub use render_error::RenderError;
pub use scan_error::ScanError;
