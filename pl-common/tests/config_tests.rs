//! Tests for configuration loading and graceful degradation
//!
//! Tests that manipulate XDG_CONFIG_HOME are marked with #[serial] so they do
//! not race each other.

use pl_common::config::{
    default_config_path, BackendKind, CompiledDefaults, ConfigSource, TomlConfig, DEFAULT_AUDIO_BUCKET,
    DEFAULT_IMAGES_BUCKET,
};
use serial_test::serial;
use std::env;
use std::fs;

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.data_dir.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.bind_addr, "127.0.0.1");
}

#[test]
fn test_empty_file_yields_defaults() {
    let config = TomlConfig::parse("").unwrap();

    assert!(config.port.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.backend.kind, BackendKind::Local);
    assert_eq!(config.backend.images_bucket, DEFAULT_IMAGES_BUCKET);
    assert_eq!(config.backend.audio_bucket, DEFAULT_AUDIO_BUCKET);
    assert_eq!(config.backend.table, "partner");
}

#[test]
fn test_full_file_parses() {
    let config = TomlConfig::parse(
        r#"
bind_addr = "0.0.0.0"
port = 6000
public_base = "http://partners.lan:6000"

[logging]
level = "debug"

[backend]
kind = "supabase"
url = "https://abc.supabase.co"
anon_key = "public-anon-key"
images_bucket = "imgs"
"#,
    )
    .unwrap();

    assert_eq!(config.bind_addr_or_default(), "0.0.0.0");
    assert_eq!(config.port, Some(6000));
    assert_eq!(config.public_base.as_deref(), Some("http://partners.lan:6000"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.backend.kind, BackendKind::Supabase);
    assert_eq!(config.backend.images_bucket, "imgs");
    assert_eq!(config.backend.audio_bucket, DEFAULT_AUDIO_BUCKET);
    assert!(config.backend.validate().is_ok());
}

#[test]
fn test_invalid_file_is_an_error_when_parsed_directly() {
    assert!(TomlConfig::parse("port = \"not a number\"").is_err());
}

#[test]
fn test_load_or_default_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (config, source) = TomlConfig::load_or_default(Some(&dir.path().join("missing.toml")));

    assert!(config.port.is_none());
    assert!(matches!(source, ConfigSource::Ignored { .. }));
    assert_eq!(config.backend.kind, BackendKind::Local);
}

#[test]
fn test_load_or_default_tolerates_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[backend\nkind = ").unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config.logging.level, "info");
    match source {
        ConfigSource::Ignored { path: ignored, reason } => {
            assert_eq!(ignored, path);
            assert!(reason.contains("invalid config file"));
        }
        other => panic!("expected Ignored, got {:?}", other),
    }
}

#[test]
fn test_load_or_default_reads_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = 5799\n[backend]\ndata_dir = \"/tmp/pl-data\"\n").unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path));
    assert_eq!(source, ConfigSource::File(path.clone()));
    assert_eq!(config.port, Some(5799));
    assert_eq!(config.backend.data_dir(), std::path::PathBuf::from("/tmp/pl-data"));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_config_path_uses_user_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("partner-list");
    fs::create_dir_all(&app_dir).unwrap();
    fs::write(app_dir.join("config.toml"), "port = 1234\n").unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let found = default_config_path();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(found, Some(app_dir.join("config.toml")));
}
