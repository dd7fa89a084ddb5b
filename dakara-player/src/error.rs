//! Error types for dakara-player
//!
//! Setup failures (karaoke folder, media engine, templates, backgrounds) are
//! returned as errors and end startup. Failures during playback never reach
//! the caller: the orchestrator folds them into callback notifications.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dakara-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configured karaoke folder does not exist
    #[error("Karaoke folder \"{}\" does not exist", .0.display())]
    KaraFolderNotFound(PathBuf),

    /// Media engine binary or library is missing
    #[error("{0} is not available")]
    MediaPlayerNotAvailable(String),

    /// Overlay template missing, with no default fallback
    #[error("No template file for {0} screen found")]
    TemplateNotFound(String),

    /// Overlay template does not parse or does not render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Background image missing, with no default fallback
    #[error("No background file for {0} screen found")]
    BackgroundNotFound(String),

    /// Song file of a playlist entry is missing
    #[error("File not found \"{}\"", .0.display())]
    FileNotFound(PathBuf),

    /// Media engine reported a fault or refused a command
    #[error("Media engine error: {0}")]
    Engine(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading errors
    #[error(transparent)]
    Config(#[from] dakara_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using dakara-player Error
pub type Result<T> = std::result::Result<T, Error>;
