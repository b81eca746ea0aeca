//! Scanner types.

use std::path::PathBuf;
use std::time::Duration;

use dih_core::constants::SOURCE_EXTENSIONS;
use dih_core::errors::ScanError;

/// What to scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root directory to scan; reported paths are relative to it.
    pub root: PathBuf,
    /// File extensions to collect, without the dot.
    pub extensions: Vec<String>,
    /// Additional gitignore-style patterns.
    pub extra_ignores: Vec<String>,
    /// Larger files are skipped and reported.
    pub max_file_size: u64,
}

impl ScanConfig {
    /// Scan `root` for book sources (`.qmd`, `.md`).
    pub fn sources(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            extra_ignores: Vec::new(),
            max_file_size: 5 * 1024 * 1024,
        }
    }

    /// Scan a rendered output tree for `.html` pages. Ignores apply to
    /// paths below the root, so pointing this at `_book` works.
    pub fn rendered(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["html".to_string()],
            extra_ignores: Vec::new(),
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

/// A source document read into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the scan root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub content: String,
}

impl SourceFile {
    pub fn new(rel_path: impl Into<String>, abs_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            abs_path: abs_path.into(),
            content: content.into(),
        }
    }
}

/// Files found plus the non-fatal problems met on the way.
#[derive(Debug)]
pub struct ScanResult {
    /// Sorted by `rel_path`.
    pub files: Vec<SourceFile>,
    pub errors: Vec<ScanError>,
    pub duration: Duration,
}
