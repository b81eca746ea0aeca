//! Book layout configuration: where sources, outputs and generated files live.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Paths are relative to the book root unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BookConfig {
    /// Directory holding the `.qmd` sources. Default: `.`.
    pub source_dir: Option<PathBuf>,
    /// Rendered output directory. Default: `_book`.
    pub output_dir: Option<PathBuf>,
    /// Parameter table. Default: `parameters.toml`.
    pub parameters_file: Option<PathBuf>,
    /// Generated Quarto variables file. Default: `_variables.yml`.
    pub variables_file: Option<PathBuf>,
    /// Bibliography document. Default: `references.qmd`.
    pub references_file: Option<PathBuf>,
    /// Extracted bibliography. Default: `references.json`.
    pub references_json: Option<PathBuf>,
    /// Generated parameter appendix. Default: `appendix/parameters-and-calculations.qmd`.
    pub appendix_file: Option<PathBuf>,
    /// Additional gitignore-style patterns excluded from scans.
    #[serde(default)]
    pub extra_ignore: Vec<String>,
}

impl BookConfig {
    pub fn effective_source_dir(&self, root: &Path) -> PathBuf {
        resolve(root, self.source_dir.as_deref(), ".")
    }

    pub fn effective_output_dir(&self, root: &Path) -> PathBuf {
        resolve(root, self.output_dir.as_deref(), "_book")
    }

    pub fn effective_parameters_file(&self, root: &Path) -> PathBuf {
        resolve(root, self.parameters_file.as_deref(), "parameters.toml")
    }

    pub fn effective_variables_file(&self, root: &Path) -> PathBuf {
        resolve(root, self.variables_file.as_deref(), "_variables.yml")
    }

    pub fn effective_references_file(&self, root: &Path) -> PathBuf {
        resolve(root, self.references_file.as_deref(), "references.qmd")
    }

    pub fn effective_references_json(&self, root: &Path) -> PathBuf {
        resolve(root, self.references_json.as_deref(), "references.json")
    }

    pub fn effective_appendix_file(&self, root: &Path) -> PathBuf {
        resolve(
            root,
            self.appendix_file.as_deref(),
            "appendix/parameters-and-calculations.qmd",
        )
    }
}

fn resolve(root: &Path, configured: Option<&Path>, default: &str) -> PathBuf {
    let path = configured.unwrap_or_else(|| Path::new(default));
    if path.is_absolute() {
        path.to_path_buf()
    } else if path == Path::new(".") {
        root.to_path_buf()
    } else {
        root.join(path)
    }
}
