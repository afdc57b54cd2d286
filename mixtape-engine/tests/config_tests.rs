//! Settings file resolution and graceful degradation
//!
//! - A missing settings file yields the built-in defaults and a `Missing` origin to warn about
//! - An unparseable file is an error
//! - Explicit path beats `MIXTAPE_CONFIG`, which beats the per-user default
//! - Loaded settings flow into the engine
//!
//! Tests that touch `MIXTAPE_CONFIG` are marked `#[serial]` so they never race.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use mixtape_engine::config::{
    load_toml_config, resolve_config_path, SettingsOrigin, CONFIG_ENV_VAR, DEFAULT_SEED,
};
use mixtape_engine::{Error, Item, MixEngine, MixOptions, RatioConfig, SourcePool, TomlConfig};
use serial_test::serial;
use tempfile::{NamedTempFile, TempDir};

fn settings_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/mixtape-from-env.toml");

    let explicit = PathBuf::from("/tmp/mixtape-explicit.toml");
    assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_is_used_without_explicit_path() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/mixtape-from-env.toml");

    assert_eq!(
        resolve_config_path(None),
        Some(PathBuf::from("/tmp/mixtape-from-env.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    // Falls through to the per-user default, which only counts if it exists
    if let Some(path) = resolve_config_path(None) {
        assert!(path.ends_with("mixtape/config.toml"));
        assert!(path.exists());
    }

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let (config, origin) = TomlConfig::load(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(origin, SettingsOrigin::Missing(missing.clone()));

    env::set_var(CONFIG_ENV_VAR, &missing);
    let (config, origin) = TomlConfig::load(None).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(origin, SettingsOrigin::Missing(missing.clone()));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_file_is_loaded() {
    let file = settings_file("[mixer]\ndefault_seed = 77\n\n[logging]\nlevel = \"debug\"\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let (config, origin) = TomlConfig::load(None).unwrap();
    assert_eq!(origin, SettingsOrigin::File(file.path().to_path_buf()));
    assert_eq!(config.mixer.default_seed, 77);
    assert_eq!(config.logging.level, "debug");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let file = settings_file("[mixer\ndefault_seed = ");
    let err = load_toml_config(file.path()).unwrap_err();
    assert!(matches!(err, Error::Settings(_)), "got {:?}", err);

    let file = settings_file("[mixer]\ndefault_seed = \"seven\"\n");
    assert!(TomlConfig::load(Some(file.path())).is_err());
}

#[test]
fn test_empty_file_is_all_defaults() {
    let file = settings_file("");
    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.mixer.default_seed, DEFAULT_SEED);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_loaded_settings_drive_the_engine() {
    let file = settings_file("[mixer]\nfallback_average_duration_ms = 60000\ndefault_seed = 9\n");
    let config = load_toml_config(file.path()).unwrap();
    let engine = MixEngine::new(config.mixer);

    // No durations anywhere: every item counts the configured fallback
    let pools = [SourcePool::new(
        "a",
        "A",
        vec![Item::new("x", ""), Item::new("y", ""), Item::new("z", "")],
    )];
    let result = engine
        .mix(&pools, &RatioConfig::new(), &MixOptions::all_sources(), None)
        .unwrap();

    assert_eq!(result.seed, 9);
    assert_eq!(result.total_duration_ms, 180_000);
}

#[test]
fn test_disabled_fallback_leaves_duration_unknown() {
    let file = settings_file("[mixer]\nfallback_average_duration_ms = 0\n");
    let engine = MixEngine::new(load_toml_config(file.path()).unwrap().mixer);

    let pools = [SourcePool::new("a", "A", vec![Item::new("x", "")])];
    let result = engine
        .mix(&pools, &RatioConfig::new(), &MixOptions::all_sources(), None)
        .unwrap();
    assert_eq!(result.total_duration_ms, 0);
}
