//! Unit tests for configuration loading and config file resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate DAKARA_PLAYER_CONFIG are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use dakara_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use dakara_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[player]
fullscreen = true
kara_folder = "/srv/karaoke"
loglevel = "warn"

[player.durations]
transition_duration = 4

[player.backgrounds]
directory = "/srv/backgrounds"
transition_background_name = "my_transition.png"

[player.templates]
idle_template_name = "my_idle.ass"

[player.watchdog]
warn_long_exit = false
stop_timeout_secs = 10

[player.mpv]
vo = "gpu"

[logging]
level = "debug"
file = "/var/log/dakara.log"
"#;

#[test]
fn test_load_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("player.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = TomlConfig::load(&path).unwrap();

    assert!(config.player.fullscreen);
    assert_eq!(config.player.kara_folder, PathBuf::from("/srv/karaoke"));
    assert_eq!(config.player.loglevel, "warn");
    assert_eq!(config.player.durations.transition_duration, 4);
    assert_eq!(
        config.player.backgrounds.directory,
        Some(PathBuf::from("/srv/backgrounds"))
    );
    assert_eq!(
        config.player.backgrounds.transition_background_name.as_deref(),
        Some("my_transition.png")
    );
    assert!(config.player.backgrounds.idle_background_name.is_none());
    assert_eq!(
        config.player.templates.idle_template_name.as_deref(),
        Some("my_idle.ass")
    );
    assert!(!config.player.watchdog.warn_long_exit);
    assert_eq!(config.player.watchdog.stop_timeout_secs, 10);
    assert_eq!(config.player.mpv_options().len(), 1);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/dakara.log")));
}

#[test]
fn test_load_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let result = TomlConfig::load(&dir.path().join("missing.toml"));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_invalid_toml_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[player\nfullscreen = ").unwrap();

    match TomlConfig::load(&path) {
        Err(Error::ConfigParse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("Expected ConfigParse error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_cli_argument_has_priority() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")), CONFIG_ENV_VAR).unwrap();
    assert_eq!(resolved, PathBuf::from("/from/cli.toml"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_variable_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR).unwrap();
    assert_eq!(resolved, PathBuf::from("/from/env.toml"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_variable_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");

    // Falls through to the platform default, which either exists or is reported missing
    match resolve_config_path(None, CONFIG_ENV_VAR) {
        Ok(path) => assert!(path.ends_with("dakara/player.toml")),
        Err(Error::NotFound(_)) | Err(Error::Config(_)) => {}
        Err(e) => panic!("Unexpected error: {}", e),
    }

    env::remove_var(CONFIG_ENV_VAR);
}
