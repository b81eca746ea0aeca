//! Audiobook narration text configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NarrationConfig {
    /// Upper bound on characters per synthesis chunk. Default: 4000.
    pub max_chunk_chars: Option<usize>,
    /// Where chunk files are written. Default: `_audiobook/text`.
    pub output_dir: Option<PathBuf>,
}

impl NarrationConfig {
    pub fn effective_max_chunk_chars(&self) -> usize {
        self.max_chunk_chars.unwrap_or(4000)
    }

    pub fn effective_output_dir(&self, root: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join("_audiobook").join("text"),
        }
    }
}
