//! Tests for the layered configuration system.

use std::sync::Mutex;
use std::time::Duration;

use dih_core::config::{CliOverrides, DihConfig};
use dih_core::errors::{ConfigError, DihErrorCode};

/// Serializes tests that modify environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn tempdir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Clear all DIH_ env vars and point HOME at an empty directory so a
/// developer's own `~/.dih/config.toml` cannot leak into the tests.
fn isolate_env(home: &std::path::Path) {
    for key in [
        "DIH_OUTPUT_DIR",
        "DIH_RENDER_COMMAND",
        "DIH_RENDER_TIMEOUT_SECS",
        "DIH_RENDER_FAIL_ON_WARNINGS",
        "DIH_NARRATION_MAX_CHUNK_CHARS",
    ] {
        std::env::remove_var(key);
    }
    std::env::set_var("HOME", home);
    std::env::remove_var("USERPROFILE");
}

#[test]
fn test_defaults_when_no_files_exist() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    let dir = tempdir();
    let config = DihConfig::load(dir.path(), None).unwrap();

    assert_eq!(config.render.effective_command(), "quarto");
    assert_eq!(config.render.effective_timeout(), Duration::from_secs(300));
    assert!(config.render.effective_fail_on_warnings());
    assert!(config.validation.effective_check_links());
    assert_eq!(config.validation.effective_max_file_size(), 5 * 1024 * 1024);
    assert_eq!(config.narration.effective_max_chunk_chars(), 4000);
    assert_eq!(
        config.book.effective_output_dir(dir.path()),
        dir.path().join("_book")
    );
    assert_eq!(config.book.effective_source_dir(dir.path()), dir.path());
}

#[test]
fn test_layer_priority_cli_over_env_over_project_over_user() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    std::fs::create_dir_all(home.path().join(".dih")).unwrap();
    std::fs::write(
        home.path().join(".dih").join("config.toml"),
        r#"
[render]
command = "user-quarto"
timeout_secs = 10

[narration]
max_chunk_chars = 1000
"#,
    )
    .unwrap();

    let dir = tempdir();
    std::fs::write(
        dir.path().join("dih.toml"),
        r#"
[render]
timeout_secs = 600
fail_on_warnings = true

[book]
output_dir = "site"
"#,
    )
    .unwrap();

    std::env::set_var("DIH_RENDER_FAIL_ON_WARNINGS", "false");
    std::env::set_var("DIH_OUTPUT_DIR", "env-out");

    let cli = CliOverrides {
        output_dir: Some("cli-out".into()),
        ..Default::default()
    };
    let config = DihConfig::load(dir.path(), Some(&cli)).unwrap();

    // user value survives where nobody overrides it
    assert_eq!(config.render.effective_command(), "user-quarto");
    assert_eq!(config.narration.effective_max_chunk_chars(), 1000);
    // project beats user
    assert_eq!(config.render.timeout_secs, Some(600));
    // env beats project
    assert_eq!(config.render.fail_on_warnings, Some(false));
    // cli beats env
    assert_eq!(
        config.book.effective_output_dir(dir.path()),
        dir.path().join("cli-out")
    );

    isolate_env(home.path());
}

#[test]
fn test_invalid_env_value_is_ignored() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    std::env::set_var("DIH_RENDER_TIMEOUT_SECS", "soon");
    let dir = tempdir();
    let config = DihConfig::load(dir.path(), None).unwrap();
    assert_eq!(config.render.timeout_secs, None);

    isolate_env(home.path());
}

#[test]
fn test_invalid_toml_syntax() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    let dir = tempdir();
    std::fs::write(dir.path().join("dih.toml"), "render = {{{{").unwrap();

    match DihConfig::load(dir.path(), None) {
        Err(err @ ConfigError::ParseError { .. }) => {
            assert_eq!(err.error_code(), "CONFIG_ERROR");
            assert!(err.tagged_string().starts_with("[CONFIG_ERROR]"));
        }
        other => panic!("expected ParseError, got {other:?}"),
    }
}

#[test]
fn test_zero_timeout_rejected() {
    let result = DihConfig::from_toml("[render]\ntimeout_secs = 0\n");
    match result {
        Err(ConfigError::ValidationFailed { field, .. }) => {
            assert_eq!(field, "render.timeout_secs");
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
}

#[test]
fn test_small_chunk_size_rejected() {
    let result = DihConfig::from_toml("[narration]\nmax_chunk_chars = 50\n");
    assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
}

#[test]
fn test_bad_warning_regex_rejected() {
    let result = DihConfig::from_toml("[render]\nextra_warning_patterns = [\"(unclosed\"]\n");
    match result {
        Err(ConfigError::ValidationFailed { field, .. }) => {
            assert_eq!(field, "render.extra_warning_patterns");
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
}

#[test]
fn test_unknown_keys_are_ignored() {
    let config = DihConfig::from_toml(
        r#"
[render]
command = "quarto"
future_option = 3

[telemetry]
enabled = true
"#,
    )
    .unwrap();
    assert_eq!(config.render.effective_command(), "quarto");
}

#[test]
fn test_toml_roundtrip_preserves_values() {
    let config = DihConfig::from_toml(
        r#"
[book]
parameters_file = "data/parameters.toml"
extra_ignore = ["drafts/**"]
"#,
    )
    .unwrap();
    let text = config.to_toml().unwrap();
    let reparsed = DihConfig::from_toml(&text).unwrap();
    assert_eq!(reparsed.book.extra_ignore, vec!["drafts/**".to_string()]);
    assert_eq!(
        reparsed.book.parameters_file.as_deref(),
        Some(std::path::Path::new("data/parameters.toml"))
    );
}
