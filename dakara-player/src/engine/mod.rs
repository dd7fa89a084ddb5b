//! Media engine capability
//!
//! The orchestrator drives the native media player only through the
//! [`MediaEngine`] trait. Each concrete binding implements it; the
//! orchestrator is written once against the trait.
//!
//! **Contract:**
//! - `queue` replaces the current media but does not start it; `play` does
//! - `play`, `pause` and `queue` return quickly; `stop` may block
//! - Event handlers are invoked on engine-owned threads, in the order the
//!   engine emits the events. Handlers must not call back into the engine.

#[cfg(unix)]
pub mod mpv;

use crate::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw timing value reported before the media started playing
pub const TIMING_NOT_STARTED: i64 = -1;

/// Identifier of one queued media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaHandle(pub u64);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Engine event kinds the orchestrator subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEventKind {
    /// Media reached its natural end
    EndReached,
    /// Engine failed to play the media
    EngineError,
}

/// Event delivered by the engine for a queued media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEvent {
    pub handle: MediaHandle,
    pub kind: EngineEventKind,
}

/// Subscriber callback, invoked on an engine thread
pub type EventHandler = Box<dyn Fn(EngineEvent) + Send + Sync>;

/// Audio track selection for a media
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudioSelection {
    /// Let the engine pick the default track
    #[default]
    Auto,
    /// Play an external audio file instead of the media's own tracks
    File(PathBuf),
    /// Play the n-th audio track of the media (1-based)
    Track(u32),
}

/// Media to queue, with its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub path: PathBuf,

    /// Subtitle files displayed over the media
    pub subtitles: Vec<PathBuf>,

    pub audio: AudioSelection,

    /// Display duration for still images (backgrounds)
    pub image_duration: Option<Duration>,
}

impl MediaRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subtitles: Vec::new(),
            audio: AudioSelection::Auto,
            image_duration: None,
        }
    }

    pub fn with_subtitle(mut self, path: impl AsRef<Path>) -> Self {
        self.subtitles.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_audio(mut self, audio: AudioSelection) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_image_duration(mut self, duration: Duration) -> Self {
        self.image_duration = Some(duration);
        self
    }
}

/// Native media player capability
pub trait MediaEngine: Send + Sync {
    /// Engine name used in diagnostics ("mpv", ...)
    fn name(&self) -> &str;

    /// Engine version string, e.g. "mpv 0.35.1"
    fn version(&self) -> Result<String>;

    /// Replace the current media with `request`, without starting it
    fn queue(&self, request: &MediaRequest) -> Result<MediaHandle>;

    /// Start or resume the current media
    fn play(&self) -> Result<()>;

    /// Pause the current media
    fn pause(&self) -> Result<()>;

    fn is_paused(&self) -> Result<bool>;

    /// Elapsed time of the current media in milliseconds,
    /// [`TIMING_NOT_STARTED`] if it has not started yet
    fn get_timing_raw(&self) -> Result<i64>;

    /// Stop the engine; may block until the native player is gone
    fn stop(&self) -> Result<()>;

    /// Register a handler for one event kind
    fn subscribe(&self, kind: EngineEventKind, handler: EventHandler);

    /// Details of the last engine fault, if the engine kept any
    fn last_error_message(&self) -> Option<String>;
}
