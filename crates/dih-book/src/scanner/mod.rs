//! Book source discovery.
//!
//! Walks the source tree respecting `.gitignore`, Quarto's build and
//! cache directories and configured patterns, then reads matching files
//! in parallel.

mod ignores;
mod types;
mod walker;

pub use ignores::{IgnorePatterns, DEFAULT_IGNORE_DIRS};
pub use types::{ScanConfig, ScanResult, SourceFile};
pub use walker::Scanner;
