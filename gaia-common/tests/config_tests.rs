//! Configuration loading tests
//!
//! Covers file loading, default fallbacks and environment precedence.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that touch process environment variables are marked with #[serial].

use gaia_common::config::{Settings, CONFIG_PATH_ENV};
use serial_test::serial;
use std::env;
use std::io::Write;

const ENV_KEYS: &[&str] = &[
    CONFIG_PATH_ENV,
    "CLICKUP_API_KEY",
    "CLICKUP_API_BASE",
    "GAIA_PORT",
    "UPLOAD_DELAY_MS",
    "MAX_CONTENT_SIZE",
];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(key);
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_load_explicit_file() {
    clear_env();
    let file = write_config(
        r#"
        [clickup]
        api_key = "pk_file"

        [upload]
        delay_ms = 10
        max_content_size = 2048
        "#,
    );

    let settings = Settings::load(Some(file.path())).unwrap();

    assert_eq!(settings.clickup.api_key, "pk_file");
    assert_eq!(settings.upload.delay_ms, 10);
    assert_eq!(settings.upload.max_content_size, 2048);
    // Untouched sections keep built-in defaults
    assert_eq!(settings.retry.max_retries, 5);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = Settings::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
#[serial]
fn test_config_path_from_environment() {
    clear_env();
    let file = write_config("[server]\nport = 9321\n");
    env::set_var(CONFIG_PATH_ENV, file.path());

    let settings = Settings::load(None).unwrap();
    assert_eq!(settings.server.port, 9321);

    clear_env();
}

#[test]
#[serial]
fn test_environment_beats_file() {
    clear_env();
    let file = write_config("[clickup]\napi_key = \"pk_file\"\n[server]\nport = 9000\n");
    env::set_var("CLICKUP_API_KEY", "pk_env");
    env::set_var("GAIA_PORT", "9001");

    let settings = Settings::load(Some(file.path())).unwrap();
    assert_eq!(settings.clickup.api_key, "pk_env");
    assert_eq!(settings.server.port, 9001);

    clear_env();
}

#[test]
#[serial]
fn test_malformed_file_is_error() {
    clear_env();
    let file = write_config("[server\nport = ");
    assert!(Settings::load(Some(file.path())).is_err());
}
