//! Ignore patterns for book scans.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;

use dih_core::errors::ScanError;

/// Directories that never hold book sources.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    // Quarto build output and caches
    "_book",
    "_site",
    "_freeze",
    ".quarto",
    "site_libs",
    "*_files",
    // Generated audiobook text
    "_audiobook",
    // Tooling
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    ".pytest_cache",
    "target",
    // Version control and editors
    ".git",
    ".idea",
    ".vscode",
];

/// Gitignore-style matcher combining defaults, configured patterns and
/// the book's own `.gitignore`. `.gitignore` files in subdirectories are
/// loaded by the walker with [`IgnorePatterns::load_nested`] and take
/// precedence over the root rules for paths below them.
#[derive(Clone)]
pub struct IgnorePatterns {
    gitignore: Gitignore,
}

impl IgnorePatterns {
    pub fn new(root: &Path, extra_patterns: &[String]) -> Result<Self, ScanError> {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in DEFAULT_IGNORE_DIRS {
            let _ = builder.add_line(None, &format!("{pattern}/"));
        }

        for pattern in extra_patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| ScanError::InvalidIgnore {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }

        let gitignore = root.join(".gitignore");
        if gitignore.exists() {
            if let Some(err) = builder.add(&gitignore) {
                tracing::warn!(path = %gitignore.display(), %err, "partially unreadable .gitignore");
            }
        }

        let gitignore = builder.build().map_err(|e| ScanError::InvalidIgnore {
            pattern: "<combined>".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { gitignore })
    }

    /// Check a path relative to the scan root.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }

    /// The `.gitignore` of a directory below the root, if it has rules.
    pub fn load_nested(dir: &Path) -> Option<Gitignore> {
        let path = dir.join(".gitignore");
        if !path.is_file() {
            return None;
        }
        let (gitignore, err) = Gitignore::new(&path);
        if let Some(err) = err {
            tracing::warn!(path = %path.display(), %err, "partially unreadable .gitignore");
        }
        (!gitignore.is_empty()).then_some(gitignore)
    }

    /// Like [`is_ignored`](Self::is_ignored), with `nested` matchers
    /// (outermost first) consulted before the root rules. `abs` is the
    /// path as walked, `relative` the same path relative to the root.
    pub fn is_ignored_within(
        &self,
        nested: &[Gitignore],
        abs: &Path,
        relative: &Path,
        is_dir: bool,
    ) -> bool {
        for gitignore in nested.iter().rev() {
            match gitignore.matched(abs, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }
        self.is_ignored(relative, is_dir)
    }
}
