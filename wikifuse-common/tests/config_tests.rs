//! Integration tests for config file resolution and loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate WIKIFUSE_CONFIG are marked with #[serial].

use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wikifuse_common::config::{load_or_default, load_toml, resolve_config_path, LoggingConfig};
use wikifuse_common::Error;

#[derive(Debug, Default, Deserialize, PartialEq)]
struct SampleConfig {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    threshold: Option<f64>,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var("WIKIFUSE_TEST_CONFIG", "/tmp/from-env.toml");
    let path = resolve_config_path(None, "WIKIFUSE_TEST_CONFIG");
    env::remove_var("WIKIFUSE_TEST_CONFIG");

    assert_eq!(path, Some(PathBuf::from("/tmp/from-env.toml")));
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var("WIKIFUSE_TEST_CONFIG", "/tmp/from-env.toml");
    let path = resolve_config_path(Some(Path::new("/tmp/cli.toml")), "WIKIFUSE_TEST_CONFIG");
    env::remove_var("WIKIFUSE_TEST_CONFIG");

    assert_eq!(path, Some(PathBuf::from("/tmp/cli.toml")));
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var("WIKIFUSE_TEST_CONFIG", "   ");
    let path = resolve_config_path(None, "WIKIFUSE_TEST_CONFIG");
    env::remove_var("WIKIFUSE_TEST_CONFIG");

    // Falls through to the user config dir, which must not be the blank value
    assert_ne!(path, Some(PathBuf::from("   ")));
}

#[test]
fn test_load_toml_reads_partial_file() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "threshold = 0.9\n").unwrap();

    let cfg: SampleConfig = load_toml(&target).unwrap();
    assert_eq!(cfg.threshold, Some(0.9));
    assert_eq!(cfg.logging, LoggingConfig::default());
}

#[test]
fn test_load_toml_with_logging_section() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "[logging]\nlevel = \"debug\"\n").unwrap();

    let cfg: SampleConfig = load_toml(&target).unwrap();
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
fn test_load_toml_missing_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let err = load_toml::<SampleConfig>(&missing).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_load_toml_malformed_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "threshold = [unclosed\n").unwrap();

    let err = load_toml::<SampleConfig>(&target).unwrap_err();
    assert!(matches!(err, Error::TomlParse(_)));
}

#[test]
#[serial]
fn test_load_or_default_with_explicit_file() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "threshold = 0.5\n").unwrap();

    let cfg: SampleConfig = load_or_default(Some(&target), "WIKIFUSE_TEST_CONFIG").unwrap();
    assert_eq!(cfg.threshold, Some(0.5));
}
