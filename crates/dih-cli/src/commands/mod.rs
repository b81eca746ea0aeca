//! Subcommand implementations. Each returns `Ok(false)` when it ran to
//! completion but found problems.

pub(crate) mod check;
pub(crate) mod generate;
pub(crate) mod narrate;
pub(crate) mod params;
pub(crate) mod render;

use anyhow::anyhow;
use serde::Serialize;

use dih_book::report::available_formats;
use dih_book::{create_reporter, Book, Reporter};

use crate::OutputFormat;

pub(crate) struct Context {
    pub book: Book,
    pub format: OutputFormat,
    pub reporter: Box<dyn Reporter>,
}

impl Context {
    pub fn new(book: Book, format: OutputFormat, use_color: bool) -> anyhow::Result<Self> {
        let reporter = create_reporter(format.as_str(), use_color).ok_or_else(|| {
            anyhow!(
                "unknown format `{}` (available: {})",
                format.as_str(),
                available_formats().join(", ")
            )
        })?;
        Ok(Self {
            book,
            format,
            reporter,
        })
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print `value` as JSON, or `console` otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, console: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", console());
        }
        Ok(())
    }

    /// Path relative to the book root, for messages.
    pub fn display(&self, path: &std::path::Path) -> String {
        self.book.display_path(path)
    }
}

/// Reporters return `Err(String)`; lift that into anyhow.
pub(crate) fn reported(result: Result<String, String>) -> anyhow::Result<String> {
    result.map_err(|e| anyhow!(e))
}
