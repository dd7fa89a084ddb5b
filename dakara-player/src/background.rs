//! Background images of the idle and transition screens

use crate::assets;
use crate::error::{Error, Result};
use dakara_common::config::BackgroundsConfig;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub const TRANSITION_BACKGROUND_NAME: &str = "transition.png";
pub const IDLE_BACKGROUND_NAME: &str = "idle.png";

/// Screen a background is shown on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackgroundKind {
    Idle,
    Transition,
}

impl BackgroundKind {
    fn default_name(self) -> &'static str {
        match self {
            BackgroundKind::Idle => IDLE_BACKGROUND_NAME,
            BackgroundKind::Transition => TRANSITION_BACKGROUND_NAME,
        }
    }

    fn bundled(self) -> &'static [u8] {
        match self {
            BackgroundKind::Idle => assets::IDLE_BACKGROUND,
            BackgroundKind::Transition => assets::TRANSITION_BACKGROUND,
        }
    }
}

impl fmt::Display for BackgroundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundKind::Idle => write!(f, "idle"),
            BackgroundKind::Transition => write!(f, "transition"),
        }
    }
}

/// Background image provider
pub trait BackgroundResolver: Send + Sync {
    /// Locate every background; fails with `BackgroundNotFound` when a
    /// background has no fallback
    fn load(&self) -> Result<()>;

    /// Path of the background of `kind`
    fn resolve(&self, kind: BackgroundKind) -> Result<PathBuf>;
}

/// Resolves backgrounds from a custom directory, falling back to the
/// bundled ones
pub struct BackgroundLoader {
    config: BackgroundsConfig,
    backgrounds: RwLock<HashMap<BackgroundKind, PathBuf>>,

    /// Bundled backgrounds in use; removed on drop
    bundled_dir: Mutex<Option<TempDir>>,
}

impl BackgroundLoader {
    pub fn new(config: BackgroundsConfig) -> Self {
        Self {
            config,
            backgrounds: RwLock::new(HashMap::new()),
            bundled_dir: Mutex::new(None),
        }
    }

    fn configured_name(&self, kind: BackgroundKind) -> Option<&str> {
        match kind {
            BackgroundKind::Idle => self.config.idle_background_name.as_deref(),
            BackgroundKind::Transition => self.config.transition_background_name.as_deref(),
        }
    }

    fn locate(&self, kind: BackgroundKind, bundled_dir: &mut Option<TempDir>) -> Result<PathBuf> {
        match (self.config.directory.as_deref(), self.configured_name(kind)) {
            (Some(directory), name) => {
                let custom_path = directory.join(name.unwrap_or(kind.default_name()));
                if custom_path.is_file() {
                    debug!("Loading custom {} background file {:?}", kind, custom_path);
                    return Ok(custom_path);
                }
                warn!(
                    "{} background file not found {:?}, using default one",
                    kind, custom_path
                );
            }
            (None, Some(name)) => {
                warn!(
                    "{} background name {:?} set without a directory, using default one",
                    kind, name
                );
            }
            (None, None) => {}
        }

        let directory = match bundled_dir.as_ref() {
            Some(directory) => directory.path().to_path_buf(),
            None => {
                let directory = tempfile::Builder::new().suffix(".dakara").tempdir()?;
                debug!("Created temporary directory {:?}", directory.path());
                let path = directory.path().to_path_buf();
                *bundled_dir = Some(directory);
                path
            }
        };

        write_bundled(&directory, kind)
    }
}

/// Write the bundled background of `kind` into `directory`
fn write_bundled(directory: &Path, kind: BackgroundKind) -> Result<PathBuf> {
    let path = directory.join(kind.default_name());
    std::fs::write(&path, kind.bundled())?;
    debug!("Loading default {} background file {:?}", kind, path);
    Ok(path)
}

impl BackgroundResolver for BackgroundLoader {
    fn load(&self) -> Result<()> {
        let mut bundled_dir = self.bundled_dir.lock();
        let mut backgrounds = HashMap::new();
        for kind in [BackgroundKind::Transition, BackgroundKind::Idle] {
            backgrounds.insert(kind, self.locate(kind, &mut bundled_dir)?);
        }

        *self.backgrounds.write() = backgrounds;
        Ok(())
    }

    fn resolve(&self, kind: BackgroundKind) -> Result<PathBuf> {
        self.backgrounds
            .read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::InvalidState(format!("{} background is not loaded", kind)))
    }
}
