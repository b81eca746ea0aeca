//! Top-level toolchain configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{BookConfig, NarrationConfig, RenderConfig, ValidationConfig};
use crate::constants::{CONFIG_FILE_NAME, USER_CONFIG_DIR};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sections.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`DIH_*`)
/// 3. Project config (`dih.toml` in the book root)
/// 4. User config (`~/.dih/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DihConfig {
    pub book: BookConfig,
    pub validation: ValidationConfig,
    pub render: RenderConfig,
    pub narration: NarrationConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub render_timeout_secs: Option<u64>,
    pub render_fail_on_warnings: Option<bool>,
    pub render_command: Option<String>,
}

impl DihConfig {
    /// Load configuration for the book at `root`, layering user, project,
    /// environment and CLI values over the defaults.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        Self::load_with(&root.join(CONFIG_FILE_NAME), cli_overrides)
    }

    /// Like [`DihConfig::load`] but with an explicit project config path.
    /// A missing project file falls back to defaults.
    pub fn load_with(
        project_config_path: &Path,
        cli_overrides: Option<&CliOverrides>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(err @ ConfigError::ParseError { .. }) => return Err(err),
                    Err(err) => {
                        tracing::warn!(path = %user_config_path.display(), %err, "ignoring unreadable user config");
                    }
                }
            }
        }

        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: DihConfig = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &DihConfig) -> Result<(), ConfigError> {
        if config.render.timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "render.timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if let Some(chars) = config.narration.max_chunk_chars {
            if chars < 200 {
                return Err(ConfigError::ValidationFailed {
                    field: "narration.max_chunk_chars".to_string(),
                    message: "must be at least 200".to_string(),
                });
            }
        }
        if config.validation.max_file_size == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "validation.max_file_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        for (field, patterns) in [
            ("render.extra_warning_patterns", &config.render.extra_warning_patterns),
            ("render.ignore_warning_patterns", &config.render.ignore_warning_patterns),
        ] {
            for pattern in patterns {
                if let Err(e) = regex::Regex::new(pattern) {
                    return Err(ConfigError::ValidationFailed {
                        field: field.to_string(),
                        message: format!("`{pattern}` is not a valid regex: {e}"),
                    });
                }
            }
        }
        Ok(())
    }

    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(USER_CONFIG_DIR).join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are ignored.
    fn merge_toml_file(config: &mut DihConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: DihConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins only where it has a value.
    fn merge(base: &mut DihConfig, other: &DihConfig) {
        // Book
        let (b, o) = (&mut base.book, &other.book);
        if o.source_dir.is_some() {
            b.source_dir = o.source_dir.clone();
        }
        if o.output_dir.is_some() {
            b.output_dir = o.output_dir.clone();
        }
        if o.parameters_file.is_some() {
            b.parameters_file = o.parameters_file.clone();
        }
        if o.variables_file.is_some() {
            b.variables_file = o.variables_file.clone();
        }
        if o.references_file.is_some() {
            b.references_file = o.references_file.clone();
        }
        if o.references_json.is_some() {
            b.references_json = o.references_json.clone();
        }
        if o.appendix_file.is_some() {
            b.appendix_file = o.appendix_file.clone();
        }
        if !o.extra_ignore.is_empty() {
            b.extra_ignore = o.extra_ignore.clone();
        }

        // Validation
        let (b, o) = (&mut base.validation, &other.validation);
        if o.check_links.is_some() {
            b.check_links = o.check_links;
        }
        if o.check_latex.is_some() {
            b.check_latex = o.check_latex;
        }
        if o.check_variables.is_some() {
            b.check_variables = o.check_variables;
        }
        if o.check_crossrefs.is_some() {
            b.check_crossrefs = o.check_crossrefs;
        }
        if o.check_citations.is_some() {
            b.check_citations = o.check_citations;
        }
        if o.max_file_size.is_some() {
            b.max_file_size = o.max_file_size;
        }

        // Render
        let (b, o) = (&mut base.render, &other.render);
        if o.command.is_some() {
            b.command = o.command.clone();
        }
        if o.timeout_secs.is_some() {
            b.timeout_secs = o.timeout_secs;
        }
        if o.fail_on_warnings.is_some() {
            b.fail_on_warnings = o.fail_on_warnings;
        }
        if !o.extra_warning_patterns.is_empty() {
            b.extra_warning_patterns = o.extra_warning_patterns.clone();
        }
        if !o.ignore_warning_patterns.is_empty() {
            b.ignore_warning_patterns = o.ignore_warning_patterns.clone();
        }

        // Narration
        let (b, o) = (&mut base.narration, &other.narration);
        if o.max_chunk_chars.is_some() {
            b.max_chunk_chars = o.max_chunk_chars;
        }
        if o.output_dir.is_some() {
            b.output_dir = o.output_dir.clone();
        }
    }

    /// Apply environment variable overrides.
    /// Unparseable values are ignored with a warning.
    fn apply_env_overrides(config: &mut DihConfig) {
        if let Ok(val) = std::env::var("DIH_OUTPUT_DIR") {
            config.book.output_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("DIH_RENDER_COMMAND") {
            config.render.command = Some(val);
        }
        if let Ok(val) = std::env::var("DIH_RENDER_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(v) => config.render.timeout_secs = Some(v),
                Err(_) => tracing::warn!(value = %val, "ignoring invalid DIH_RENDER_TIMEOUT_SECS"),
            }
        }
        if let Ok(val) = std::env::var("DIH_RENDER_FAIL_ON_WARNINGS") {
            match val.parse::<bool>() {
                Ok(v) => config.render.fail_on_warnings = Some(v),
                Err(_) => tracing::warn!(value = %val, "ignoring invalid DIH_RENDER_FAIL_ON_WARNINGS"),
            }
        }
        if let Ok(val) = std::env::var("DIH_NARRATION_MAX_CHUNK_CHARS") {
            match val.parse::<usize>() {
                Ok(v) => config.narration.max_chunk_chars = Some(v),
                Err(_) => tracing::warn!(value = %val, "ignoring invalid DIH_NARRATION_MAX_CHUNK_CHARS"),
            }
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut DihConfig, cli: &CliOverrides) {
        if let Some(ref v) = cli.output_dir {
            config.book.output_dir = Some(v.clone());
        }
        if let Some(v) = cli.render_timeout_secs {
            config.render.timeout_secs = Some(v);
        }
        if let Some(v) = cli.render_fail_on_warnings {
            config.render.fail_on_warnings = Some(v);
        }
        if let Some(ref v) = cli.render_command {
            config.render.command = Some(v.clone());
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
