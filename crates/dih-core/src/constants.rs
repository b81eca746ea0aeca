//! Workspace-wide constants.

/// Project config file name, looked up in the book root.
pub const CONFIG_FILE_NAME: &str = "dih.toml";

/// User-level config directory under `$HOME`.
pub const USER_CONFIG_DIR: &str = ".dih";

/// Environment variable holding the tracing filter.
pub const LOG_ENV_VAR: &str = "DIH_LOG";

/// Header written at the top of every generated file.
pub const GENERATED_HEADER: &str =
    "AUTO-GENERATED by `dih` from the parameter registry. Do not edit by hand.";

/// Source document extensions the book is built from.
pub const SOURCE_EXTENSIONS: &[&str] = &["qmd", "md"];
