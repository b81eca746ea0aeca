//! A book checkout and the operations run against it.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use dih_core::config::DihConfig;
use dih_core::errors::{BookError, ExportError, ParameterError, ScanError};
use dih_params::export::{self, WriteStatus};
use dih_params::{load_registry, ParameterRegistry};

use crate::audit::{audit_usage, UsageAudit};
use crate::narration::{narration_variables, prepare_book, prepare_chapter, NarrationManifest};
use crate::references::{extract_references, reference_ids, write_references_json, Reference};
use crate::scanner::{ScanConfig, ScanResult, Scanner};
use crate::validation::{variable_keys, Finding, PostRenderValidator, PreRenderValidator, ValidationReport};

/// Rule id for source files the scanner had to skip.
pub const UNREADABLE_FILE: &str = "unreadable-file";

/// Book root plus resolved configuration.
#[derive(Debug, Clone)]
pub struct Book {
    root: PathBuf,
    config: DihConfig,
}

impl Book {
    pub fn new(root: impl Into<PathBuf>, config: DihConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &DihConfig {
        &self.config
    }

    pub fn source_dir(&self) -> PathBuf {
        self.config.book.effective_source_dir(&self.root)
    }

    pub fn load_registry(&self) -> Result<ParameterRegistry, ParameterError> {
        load_registry(&self.config.book.effective_parameters_file(&self.root))
    }

    /// Read every source document.
    pub fn scan_sources(&self) -> Result<ScanResult, ScanError> {
        let mut scan = ScanConfig::sources(self.source_dir());
        scan.extra_ignores = self.config.book.extra_ignore.clone();
        scan.max_file_size = self.config.validation.effective_max_file_size();
        Scanner::new(scan)?.scan()
    }

    /// Parse the references document, `None` when the book has none.
    pub fn read_references(&self) -> Result<Option<Vec<Reference>>, ExportError> {
        let path = self.config.book.effective_references_file(&self.root);
        if !path.exists() {
            debug!(path = %path.display(), "no references document");
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ExportError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Some(extract_references(&text)))
    }

    /// Regenerate the variables file.
    pub fn write_variables(&self, registry: &ParameterRegistry) -> Result<WriteStatus, ExportError> {
        export::write_variables_file(registry, &self.config.book.effective_variables_file(&self.root))
    }

    /// Whether the variables file on disk differs from what the registry
    /// would generate.
    pub fn variables_stale(&self, registry: &ParameterRegistry) -> Result<bool, ExportError> {
        let path = self.config.book.effective_variables_file(&self.root);
        let expected = export::render_variables(registry)?;
        Ok(std::fs::read_to_string(&path).map_or(true, |current| current != expected))
    }

    /// Regenerate the parameter appendix, linking sources to the
    /// references page.
    pub fn write_appendix(&self, registry: &ParameterRegistry) -> Result<WriteStatus, ExportError> {
        let appendix = self.config.book.effective_appendix_file(&self.root);
        let references = self.config.book.effective_references_file(&self.root);
        let href = relative_href(&self.root, &appendix, &references);
        let text = export::reference_appendix(registry, &href);
        let status = export::write_if_changed(&appendix, &text)?;
        info!(path = %appendix.display(), parameters = registry.len(), ?status, "parameter appendix");
        Ok(status)
    }

    /// Source checks before rendering.
    pub fn validate(&self) -> Result<ValidationReport, BookError> {
        let registry = self.load_registry()?;
        let scan = self.scan_sources()?;
        let references = self.read_references()?;

        let mut validator =
            PreRenderValidator::new(&self.root, &self.config.validation, variable_keys(&registry));
        if let Some(ref refs) = references {
            let origin = self.display_path(&self.config.book.effective_parameters_file(&self.root));
            validator = validator.with_citations(&registry, reference_ids(refs), origin);
        }
        let mut report = validator.validate(&scan.files);
        for err in &scan.errors {
            report.push(Finding::warning(
                UNREADABLE_FILE,
                self.scan_error_file(err),
                0,
                err.to_string(),
            ));
        }
        Ok(report.finish())
    }

    /// Output checks after rendering.
    pub fn validate_output(&self) -> Result<ValidationReport, BookError> {
        let output = self.config.book.effective_output_dir(&self.root);
        Ok(PostRenderValidator::new(output).validate()?)
    }

    pub fn audit(&self) -> Result<UsageAudit, BookError> {
        let registry = self.load_registry()?;
        let scan = self.scan_sources()?;
        Ok(audit_usage(&registry, &scan.files))
    }

    /// Extract the bibliography and write the references JSON.
    pub fn write_references(&self) -> Result<(Vec<Reference>, WriteStatus), BookError> {
        let path = self.config.book.effective_references_file(&self.root);
        let refs = self.read_references()?.ok_or_else(|| ExportError::Read {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "references document not found"),
        })?;
        let status = write_references_json(&refs, &self.config.book.effective_references_json(&self.root))?;
        Ok((refs, status))
    }

    /// Write narration chunks for the whole book, or for one chapter.
    pub fn narrate(&self, chapter: Option<&Path>) -> Result<NarrationManifest, BookError> {
        let registry = self.load_registry()?;
        let scan = self.scan_sources()?;
        let variables = narration_variables(&registry);
        let out_dir = self.config.narration.effective_output_dir(&self.root);
        let max_chars = self.config.narration.effective_max_chunk_chars();
        let Some(chapter) = chapter else {
            return Ok(prepare_book(&scan.files, &variables, &out_dir, max_chars)?);
        };

        let wanted = self.display_path(&self.root.join(chapter));
        let Some(file) = scan.files.iter().find(|f| self.display_path(&f.abs_path) == wanted) else {
            return Err(ScanError::IoError {
                path: chapter.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "chapter not found among sources"),
            }
            .into());
        };
        Ok(prepare_chapter(&scan.files, &file.rel_path, &variables, &out_dir, max_chars)?)
    }

    /// `path` relative to the book root, `/`-separated.
    pub fn display_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.join("/")
    }

    fn scan_error_file(&self, err: &ScanError) -> String {
        match err {
            ScanError::IoError { path, .. } | ScanError::MaxFileSizeExceeded { path, .. } => {
                self.display_path(path)
            }
            _ => String::new(),
        }
    }
}

/// Link from the page at `from` to the page at `to`, both under `root`.
fn relative_href(root: &Path, from: &Path, to: &Path) -> String {
    let to_rel = match to.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => {
            return to
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        }
    };
    let depth = from
        .parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|dir| dir.components().filter(|c| matches!(c, Component::Normal(_))).count())
        .unwrap_or(0);
    let mut href = "../".repeat(depth);
    let target: Vec<String> = to_rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    href.push_str(&target.join("/"));
    href
}
