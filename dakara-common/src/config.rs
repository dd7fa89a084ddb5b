//! Configuration loading and config file resolution
//!
//! The player reads a single TOML file. Every section is optional; missing
//! keys fall back to the built-in defaults below.
//!
//! # Config File Resolution
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`DAKARA_PLAYER_CONFIG`)
//! 3. OS-dependent config directory (`<config_dir>/dakara/player.toml`)

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable holding the config file path
pub const CONFIG_ENV_VAR: &str = "DAKARA_PLAYER_CONFIG";

/// Default duration of the transition screen (seconds)
pub const TRANSITION_DURATION: u64 = 2;

/// Default duration of one idle screen loop (seconds)
pub const IDLE_DURATION: u64 = 300;

/// Default time the media player is given to stop before a warning (seconds)
pub const PLAYER_CLOSING_DURATION: u64 = 3;

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Media player configuration
    #[serde(default)]
    pub player: PlayerConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Media player configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Display the player fullscreen
    #[serde(default)]
    pub fullscreen: bool,

    /// Root folder of the karaoke files; song paths are relative to it
    #[serde(default)]
    pub kara_folder: PathBuf,

    /// Log level forwarded to the media engine
    #[serde(default = "default_log_level")]
    pub loglevel: String,

    #[serde(default)]
    pub durations: DurationsConfig,

    #[serde(default)]
    pub backgrounds: BackgroundsConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Extra options passed verbatim to mpv (property name → value)
    #[serde(default)]
    pub mpv: BTreeMap<String, toml::Value>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fullscreen: false,
            kara_folder: PathBuf::new(),
            loglevel: default_log_level(),
            durations: DurationsConfig::default(),
            backgrounds: BackgroundsConfig::default(),
            templates: TemplatesConfig::default(),
            watchdog: WatchdogConfig::default(),
            mpv: BTreeMap::new(),
        }
    }
}

impl PlayerConfig {
    /// Extra mpv options converted to JSON values for the IPC protocol
    ///
    /// Options that cannot be represented in JSON (e.g. TOML datetimes) are
    /// skipped with a warning.
    pub fn mpv_options(&self) -> Vec<(String, serde_json::Value)> {
        self.mpv
            .iter()
            .filter_map(|(key, value)| match serde_json::to_value(value) {
                Ok(json) => Some((key.clone(), json)),
                Err(e) => {
                    warn!("Ignoring mpv option '{}': {}", key, e);
                    None
                }
            })
            .collect()
    }
}

/// Screen durations
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct DurationsConfig {
    /// Transition screen duration in seconds
    #[serde(default = "default_transition_duration")]
    pub transition_duration: u64,

    /// Idle screen loop duration in seconds
    #[serde(default = "default_idle_duration")]
    pub idle_duration: u64,
}

impl Default for DurationsConfig {
    fn default() -> Self {
        Self {
            transition_duration: TRANSITION_DURATION,
            idle_duration: IDLE_DURATION,
        }
    }
}

/// Custom background images
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackgroundsConfig {
    /// Directory holding custom backgrounds
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default)]
    pub transition_background_name: Option<String>,

    #[serde(default)]
    pub idle_background_name: Option<String>,
}

/// Custom overlay text templates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemplatesConfig {
    /// Directory holding custom templates
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default)]
    pub transition_template_name: Option<String>,

    #[serde(default)]
    pub idle_template_name: Option<String>,
}

/// Stop watchdog settings
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Warn when the player takes too long to stop
    #[serde(default = "default_true")]
    pub warn_long_exit: bool,

    /// Seconds before the stop warning is emitted
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            warn_long_exit: true,
            stop_timeout_secs: PLAYER_CLOSING_DURATION,
        }
    }
}

impl WatchdogConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_transition_duration() -> u64 {
    TRANSITION_DURATION
}

fn default_idle_duration() -> u64 {
    IDLE_DURATION
}

fn default_stop_timeout() -> u64 {
    PLAYER_CLOSING_DURATION
}

fn default_true() -> bool {
    true
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {:?}: {}", path, e))
        })?;

        let config = Self::from_toml_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

/// Resolve the configuration file path
///
/// Priority order:
/// 1. Command-line argument
/// 2. Environment variable `env_var_name`
/// 3. OS-dependent default, only if the file exists
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: OS-dependent default
    let default_path = default_config_path()
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if default_path.exists() {
        Ok(default_path)
    } else {
        Err(Error::NotFound(format!(
            "No config file given and {:?} does not exist",
            default_path
        )))
    }
}

/// Get the OS-dependent default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dakara").join("player.toml"))
}
