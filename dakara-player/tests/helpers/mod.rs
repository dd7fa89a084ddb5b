//! Test helpers for dakara-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - FakeEngine: scripted media engine emitting events from its own thread
//! - FakeOverlay / FakeBackgrounds: asset collaborators with fixed paths
//! - EventRecorder: records every callback as a `PlayerEvent`
//! - TestPlayer: loaded orchestrator over a temporary karaoke folder

#![allow(dead_code)]

pub mod fake_engine;

pub use fake_engine::FakeEngine;

use dakara_common::config::DurationsConfig;
use dakara_common::{PlayerEvent, PlaylistEntry};
use dakara_player::background::{BackgroundKind, BackgroundResolver};
use dakara_player::overlay::{IdleInfo, TextOverlayService};
use dakara_player::worker::{self, ExitWatchdog, WorkerGuard};
use dakara_player::{Callbacks, Error, Orchestrator, OrchestratorSettings, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const IDLE_TEXT: &str = "/overlay/idle.ass";
pub const TRANSITION_TEXT: &str = "/overlay/transition.ass";

pub fn background_path(kind: BackgroundKind) -> PathBuf {
    PathBuf::from(format!("/backgrounds/{}.png", kind))
}

// ================================================================================================
// Asset collaborators
// ================================================================================================

#[derive(Default)]
pub struct FakeOverlay {
    pub fail_load: bool,
    pub idle_renders: AtomicUsize,
    pub transition_renders: AtomicUsize,
    pub last_idle_info: Mutex<Option<IdleInfo>>,
}

impl TextOverlayService for FakeOverlay {
    fn load(&self) -> Result<()> {
        if self.fail_load {
            Err(Error::TemplateNotFound("transition".to_string()))
        } else {
            Ok(())
        }
    }

    fn render_idle(&self, info: &IdleInfo) -> Result<PathBuf> {
        self.idle_renders.fetch_add(1, Ordering::SeqCst);
        *self.last_idle_info.lock() = Some(info.clone());
        Ok(PathBuf::from(IDLE_TEXT))
    }

    fn render_transition(&self, _entry: &PlaylistEntry) -> Result<PathBuf> {
        self.transition_renders.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from(TRANSITION_TEXT))
    }
}

#[derive(Default)]
pub struct FakeBackgrounds {
    pub fail_load: bool,
}

impl BackgroundResolver for FakeBackgrounds {
    fn load(&self) -> Result<()> {
        if self.fail_load {
            Err(Error::BackgroundNotFound("idle".to_string()))
        } else {
            Ok(())
        }
    }

    fn resolve(&self, kind: BackgroundKind) -> Result<PathBuf> {
        Ok(background_path(kind))
    }
}

// ================================================================================================
// Callback recording
// ================================================================================================

#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl EventRecorder {
    pub fn attach(callbacks: &Callbacks) -> Self {
        let recorder = Self::default();
        let events = Arc::clone(&recorder.events);
        callbacks.set_all(move |event| events.lock().push(event));
        recorder
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    /// Recorded events, clearing the record
    pub fn take(&self) -> Vec<PlayerEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

// ================================================================================================
// Loaded player fixture
// ================================================================================================

pub struct TestPlayer {
    pub engine: FakeEngine,
    pub overlay: Arc<FakeOverlay>,
    pub player: WorkerGuard<Orchestrator>,
    pub events: EventRecorder,
    pub kara_folder: TempDir,
}

pub fn settings(kara_folder: &Path) -> OrchestratorSettings {
    OrchestratorSettings {
        kara_folder: kara_folder.to_path_buf(),
        durations: DurationsConfig::default(),
        stop_timeout: Duration::from_secs(3),
        warn_long_exit: true,
    }
}

impl TestPlayer {
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    pub fn start_with(configure: impl FnOnce(&mut OrchestratorSettings)) -> Self {
        let kara_folder = TempDir::new().unwrap();
        let engine = FakeEngine::new();
        let overlay = Arc::new(FakeOverlay::default());

        let mut settings = settings(kara_folder.path());
        configure(&mut settings);

        let init_engine = engine.clone();
        let init_overlay = Arc::clone(&overlay);
        let player = worker::start(
            move || {
                Ok(Orchestrator::new(
                    settings,
                    Arc::new(init_engine),
                    init_overlay,
                    Arc::new(FakeBackgrounds::default()),
                ))
            },
            ExitWatchdog::default(),
        )
        .unwrap();

        let events = EventRecorder::attach(player.callbacks());

        Self {
            engine,
            overlay,
            player,
            events,
            kara_folder,
        }
    }

    /// Create a song file in the karaoke folder
    pub fn add_song(&self, name: &str) -> PathBuf {
        let path = self.kara_folder.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"").unwrap();
        path
    }

    /// Entry for a song that exists in the karaoke folder
    pub fn entry(&self, id: i64, name: &str) -> PlaylistEntry {
        self.add_song(name);
        PlaylistEntry::new(id, name)
    }

    /// Current media reaches its end; returns once handled
    pub fn end_reached(&self) {
        self.engine.end_reached();
        self.player.flush();
    }

    /// Current media fails; returns once handled
    pub fn engine_error(&self, message: Option<&str>) {
        self.engine.engine_error(message);
        self.player.flush();
    }

    /// Start an entry and run its transition to the song
    pub fn play_song(&self, id: i64, name: &str) {
        self.player.set_playlist_entry(self.entry(id, name), true);
        self.end_reached();
    }
}
