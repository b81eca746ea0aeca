//! Stable error codes for CLI and JSON output.

/// Every error enum maps to a stable, machine-readable code.
pub trait DihErrorCode {
    /// Returns the error code string (e.g., "CONFIG_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns `[ERROR_CODE] message`.
    fn tagged_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const PARAMETER_ERROR: &str = "PARAMETER_ERROR";
pub const FORMULA_ERROR: &str = "FORMULA_ERROR";
pub const SCAN_ERROR: &str = "SCAN_ERROR";
pub const EXPORT_ERROR: &str = "EXPORT_ERROR";
pub const RENDER_ERROR: &str = "RENDER_ERROR";
pub const CANCELLED: &str = "CANCELLED";
