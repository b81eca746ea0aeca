//! File walker: sequential directory walk, parallel reads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use ignore::gitignore::Gitignore;
use rayon::prelude::*;
use tracing::{debug, info};

use dih_core::errors::ScanError;
use dih_core::traits::cancellation::{Cancellable, CancellationToken};

use super::ignores::IgnorePatterns;
use super::types::{ScanConfig, ScanResult, SourceFile};

/// Collects and reads book files.
pub struct Scanner {
    config: ScanConfig,
    ignores: IgnorePatterns,
    cancel: Option<CancellationToken>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let ignores = IgnorePatterns::new(&config.root, &config.extra_ignores)?;
        Ok(Self {
            config,
            ignores,
            cancel: None,
        })
    }

    /// Stop between files once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Walk the tree and read every matching file. Unreadable or oversized
    /// files are reported in `errors` and skipped.
    pub fn scan(&self) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        if !self.config.root.is_dir() {
            return Err(ScanError::MissingRoot {
                path: self.config.root.clone(),
            });
        }

        let mut paths = Vec::new();
        self.walk_dir(&self.config.root, &mut Vec::new(), &mut paths);
        paths.sort();
        debug!(root = %self.config.root.display(), candidates = paths.len(), "walk complete");

        let errors: Mutex<Vec<ScanError>> = Mutex::new(Vec::new());
        let mut files: Vec<SourceFile> = paths
            .par_iter()
            .filter_map(|path| {
                if self.is_cancelled() {
                    return None;
                }
                match self.read_file(path) {
                    Ok(file) => Some(file),
                    Err(e) => {
                        if let Ok(mut errs) = errors.lock() {
                            errs.push(e);
                        }
                        None
                    }
                }
            })
            .collect();

        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        let errors = errors.into_inner().unwrap_or_default();
        info!(
            root = %self.config.root.display(),
            files = files.len(),
            errors = errors.len(),
            "scan complete"
        );
        Ok(ScanResult {
            files,
            errors,
            duration: start.elapsed(),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// `nested` holds the `.gitignore` matchers of the directories
    /// between the root and `dir`.
    fn walk_dir(&self, dir: &Path, nested: &mut Vec<Gitignore>, files: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };
        let pushed = match IgnorePatterns::load_nested(dir) {
            Some(gitignore) if dir != self.config.root.as_path() => {
                debug!(dir = %dir.display(), "loaded nested .gitignore");
                nested.push(gitignore);
                true
            }
            _ => false,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let relative = path.strip_prefix(&self.config.root).unwrap_or(&path);

            if path.is_dir() {
                if !self.ignores.is_ignored_within(nested, &path, relative, true) {
                    self.walk_dir(&path, nested, files);
                }
            } else if path.is_file()
                && self.has_wanted_extension(&path)
                && !self.ignores.is_ignored_within(nested, &path, relative, false)
            {
                files.push(path);
            }
        }

        if pushed {
            nested.pop();
        }
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }

    fn read_file(&self, path: &Path) -> Result<SourceFile, ScanError> {
        let metadata = fs::metadata(path).map_err(|source| ScanError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() > self.config.max_file_size {
            return Err(ScanError::MaxFileSizeExceeded {
                path: path.to_path_buf(),
                size: metadata.len(),
                max: self.config.max_file_size,
            });
        }
        let content = fs::read_to_string(path).map_err(|source| ScanError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(SourceFile {
            rel_path: relative_string(&self.config.root, path),
            abs_path: path.to_path_buf(),
            content,
        })
    }
}

/// `/`-separated path of `path` relative to `root`.
pub(crate) fn relative_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("chapters")).unwrap();
        fs::create_dir_all(root.join("_book")).unwrap();
        fs::write(root.join("index.qmd"), "# Home\n").unwrap();
        fs::write(root.join("chapters/b.qmd"), "# B\n").unwrap();
        fs::write(root.join("chapters/a.md"), "# A\n").unwrap();
        fs::write(root.join("chapters/notes.txt"), "skip").unwrap();
        fs::write(root.join("_book/index.qmd"), "stale copy").unwrap();
        dir
    }

    #[test]
    fn test_collects_sources_sorted() {
        let dir = book();
        let scanner = Scanner::new(ScanConfig::sources(dir.path())).unwrap();
        let result = scanner.scan().unwrap();
        let paths: Vec<_> = result.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, ["chapters/a.md", "chapters/b.qmd", "index.qmd"]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_oversized_files_are_reported_not_fatal() {
        let dir = book();
        let mut config = ScanConfig::sources(dir.path());
        config.max_file_size = 5;
        let result = Scanner::new(config).unwrap().scan().unwrap();
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result
            .errors
            .iter()
            .all(|e| matches!(e, ScanError::MaxFileSizeExceeded { .. })));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let scanner = Scanner::new(ScanConfig::sources(dir.path().join("nope"))).unwrap();
        assert!(matches!(scanner.scan(), Err(ScanError::MissingRoot { .. })));
    }

    #[test]
    fn test_cancelled_scan() {
        let dir = book();
        let token = CancellationToken::new();
        token.cancel();
        let scanner = Scanner::new(ScanConfig::sources(dir.path()))
            .unwrap()
            .with_cancellation(token);
        assert!(matches!(scanner.scan(), Err(ScanError::Cancelled)));
    }

    #[test]
    fn test_nested_gitignore_applies_below_its_directory() {
        let dir = book();
        let root = dir.path();
        fs::write(root.join("chapters/.gitignore"), "draft-*.qmd\n").unwrap();
        fs::create_dir_all(root.join("chapters/part2")).unwrap();
        fs::write(root.join("chapters/draft-1.qmd"), "# Draft\n").unwrap();
        fs::write(root.join("chapters/part2/draft-2.qmd"), "# Draft\n").unwrap();
        fs::write(root.join("chapters/part2/c.qmd"), "# C\n").unwrap();
        fs::write(root.join("draft-0.qmd"), "# Top-level draft\n").unwrap();

        let result = Scanner::new(ScanConfig::sources(root)).unwrap().scan().unwrap();
        let paths: Vec<_> = result.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(
            paths,
            ["chapters/a.md", "chapters/b.qmd", "chapters/part2/c.qmd", "draft-0.qmd", "index.qmd"]
        );
    }
}
