//! Pre/post-render validation configuration.

use serde::{Deserialize, Serialize};

/// Toggles for each validation rule family.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Check relative links and images resolve. Default: true.
    pub check_links: Option<bool>,
    /// Check math delimiters, braces and environments. Default: true.
    pub check_latex: Option<bool>,
    /// Check `{{< var >}}` shortcodes are registered. Default: true.
    pub check_variables: Option<bool>,
    /// Check `@fig-`/`@sec-` references resolve to a label. Default: true.
    pub check_crossrefs: Option<bool>,
    /// Check parameter sources exist in the bibliography. Default: true.
    pub check_citations: Option<bool>,
    /// Largest source file scanned, in bytes. Default: 5 MiB.
    pub max_file_size: Option<u64>,
}

impl ValidationConfig {
    pub fn effective_check_links(&self) -> bool {
        self.check_links.unwrap_or(true)
    }

    pub fn effective_check_latex(&self) -> bool {
        self.check_latex.unwrap_or(true)
    }

    pub fn effective_check_variables(&self) -> bool {
        self.check_variables.unwrap_or(true)
    }

    pub fn effective_check_crossrefs(&self) -> bool {
        self.check_crossrefs.unwrap_or(true)
    }

    pub fn effective_check_citations(&self) -> bool {
        self.check_citations.unwrap_or(true)
    }

    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(5 * 1024 * 1024)
    }
}
