//! dih-core: shared foundation for the DIH book toolchain.
//!
//! - Errors: one `thiserror` enum per subsystem with stable error codes
//! - Config: `dih.toml` with CLI > env > project > user > defaults layering
//! - Tracing: `DIH_LOG`-driven subscriber setup
//! - Traits: cooperative cancellation

pub mod config;
pub mod constants;
pub mod errors;
pub mod tracing;
pub mod traits;

pub use config::{CliOverrides, DihConfig};
pub use errors::DihErrorCode;
pub use traits::cancellation::{Cancellable, CancellationToken};
