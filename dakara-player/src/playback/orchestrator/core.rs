//! Orchestrator definition, lifecycle and event dispatcher
//!
//! **Responsibilities:**
//! - Orchestrator struct definition and construction
//! - Worker lifecycle (load checks, dispatcher thread, engine teardown)
//! - Media helpers shared by commands and event handlers
//!
//! **Threads:**
//! - Commands run on the caller thread
//! - Engine events are handled on the `orchestrator-dispatch` thread

use crate::background::{BackgroundKind, BackgroundResolver};
use crate::callbacks::Callbacks;
use crate::engine::{EngineEvent, EngineEventKind, MediaEngine, MediaHandle, MediaRequest};
use crate::error::{Error, Result};
use crate::overlay::{IdleInfo, TextOverlayService};
use crate::playback::media::{self, PreparedMedia};
use crate::playback::state::PlaybackState;
use crate::worker::Worker;
use dakara_common::config::{DurationsConfig, PlayerConfig};
use dakara_common::{PlayerEvent, PlaylistEntry};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Orchestrator settings, fixed for its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Song paths are relative to this folder
    pub kara_folder: PathBuf,

    pub durations: DurationsConfig,

    /// Bounded wait of `stop_player`
    pub stop_timeout: Duration,

    /// Warn when the engine overruns `stop_timeout`
    pub warn_long_exit: bool,
}

impl From<&PlayerConfig> for OrchestratorSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            kara_folder: config.kara_folder.clone(),
            durations: config.durations,
            stop_timeout: config.watchdog.stop_timeout(),
            warn_long_exit: config.watchdog.warn_long_exit,
        }
    }
}

/// What the active media handle shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MediaKind {
    Idle,
    Transition,
    Song,
}

/// State guarded by the orchestrator mutex
#[derive(Default)]
pub(super) struct Inner {
    pub(super) state: PlaybackState,

    /// Last media handed to the engine; events for other handles are stale
    pub(super) active: Option<(MediaHandle, MediaKind)>,

    /// Song media of the entry in transition
    pub(super) next_song: Option<MediaRequest>,

    /// Entry set without autoplay while another one is still started;
    /// becomes `SongPending` once that one is over
    pub(super) deferred: Option<(Arc<PlaylistEntry>, PreparedMedia)>,
}

impl Inner {
    /// Leave the current entry after an engine failure
    pub(super) fn enter_error(&mut self) {
        self.state = match self.deferred.take() {
            Some((entry, prepared)) => PlaybackState::SongPending(entry, prepared),
            None => PlaybackState::Error,
        };
        self.active = None;
        self.next_song = None;
    }

    /// Leave the current entry, with `active` as the media now displayed
    pub(super) fn enter_idle(&mut self, active: Option<(MediaHandle, MediaKind)>) {
        self.state = match self.deferred.take() {
            Some((entry, prepared)) => PlaybackState::SongPending(entry, prepared),
            None => PlaybackState::Idle,
        };
        self.active = active;
        self.next_song = None;
    }
}

pub(super) enum DispatchMessage {
    Engine(EngineEvent),
    Flush(Sender<()>),
    Shutdown,
}

pub(super) struct Shared {
    pub(super) settings: OrchestratorSettings,
    pub(super) engine: Arc<dyn MediaEngine>,
    overlay: Arc<dyn TextOverlayService>,
    backgrounds: Arc<dyn BackgroundResolver>,
    pub(super) callbacks: Callbacks,
    pub(super) inner: Mutex<Inner>,

    dispatch_tx: Sender<DispatchMessage>,
    /// Taken by the dispatcher thread when it starts
    dispatch_rx: Mutex<Option<Receiver<DispatchMessage>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,

    /// Engine stop still running after `stop_player` gave up waiting
    pub(super) pending_stop: Mutex<Option<JoinHandle<()>>>,
}

/// Playback orchestrator
///
/// Cheap to clone; all clones drive the same player.
#[derive(Clone)]
pub struct Orchestrator {
    pub(super) shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator; nothing is checked or started before `load()`
    pub fn new(
        settings: OrchestratorSettings,
        engine: Arc<dyn MediaEngine>,
        overlay: Arc<dyn TextOverlayService>,
        backgrounds: Arc<dyn BackgroundResolver>,
    ) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::channel();

        Self {
            shared: Arc::new(Shared {
                settings,
                engine,
                overlay,
                backgrounds,
                callbacks: Callbacks::new(),
                inner: Mutex::new(Inner::default()),
                dispatch_tx,
                dispatch_rx: Mutex::new(Some(dispatch_rx)),
                dispatcher: Mutex::new(None),
                pending_stop: Mutex::new(None),
            }),
        }
    }

    /// External callbacks notified by the orchestrator
    pub fn callbacks(&self) -> &Callbacks {
        &self.shared.callbacks
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.shared.settings
    }

    /// Block until every engine event received so far has been handled
    ///
    /// Blocks the calling thread. Must not be called from a callback.
    pub fn flush(&self) {
        if self.shared.dispatcher.lock().is_none() {
            return;
        }

        let (done_tx, done_rx) = mpsc::channel();
        if self
            .shared
            .dispatch_tx
            .send(DispatchMessage::Flush(done_tx))
            .is_err()
        {
            return;
        }

        // Sender dropped if the dispatcher stopped meanwhile
        let _ = done_rx.recv();
    }

    fn start_dispatcher(&self) -> Result<()> {
        let Some(dispatch_rx) = self.shared.dispatch_rx.lock().take() else {
            debug!("Dispatcher already started");
            return Ok(());
        };

        for kind in [EngineEventKind::EndReached, EngineEventKind::EngineError] {
            let dispatch_tx = self.shared.dispatch_tx.clone();
            self.shared.engine.subscribe(
                kind,
                Box::new(move |event| {
                    // Only enqueue: never block the engine thread
                    if dispatch_tx.send(DispatchMessage::Engine(event)).is_err() {
                        trace!("Dispatcher gone, {:?} dropped", event);
                    }
                }),
            );
        }

        let shared = Arc::downgrade(&self.shared);
        let handle = thread::Builder::new()
            .name("orchestrator-dispatch".to_string())
            .spawn(move || dispatch_loop(dispatch_rx, shared))?;

        *self.shared.dispatcher.lock() = Some(handle);
        debug!("Dispatcher started");
        Ok(())
    }

    fn shutdown_dispatcher(&self) {
        let Some(handle) = self.shared.dispatcher.lock().take() else {
            return;
        };

        // Already stopped if the channel is closed
        let _ = self.shared.dispatch_tx.send(DispatchMessage::Shutdown);

        if handle.thread().id() == thread::current().id() {
            debug!("Dispatcher shut down from one of its callbacks, not joined");
            return;
        }

        if handle.join().is_err() {
            error!("Dispatcher thread panicked");
        }
    }
}

fn dispatch_loop(dispatch_rx: Receiver<DispatchMessage>, shared: Weak<Shared>) {
    while let Ok(message) = dispatch_rx.recv() {
        match message {
            DispatchMessage::Engine(event) => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let events = shared.handle_engine_event(event);
                shared.fire(events);
            }
            DispatchMessage::Flush(done_tx) => {
                let _ = done_tx.send(());
            }
            DispatchMessage::Shutdown => break,
        }
    }

    debug!("Dispatcher stopped");
}

impl Shared {
    /// Invoke callbacks in order; the state lock must not be held
    pub(super) fn fire(&self, events: Vec<PlayerEvent>) {
        for event in events {
            debug!("Notifying {} for entry {}", event.name(), event.playlist_entry_id());
            self.callbacks.fire(&event);
        }
    }

    pub(super) fn queue_and_play(&self, request: &MediaRequest) -> Result<MediaHandle> {
        let handle = self.engine.queue(request)?;
        self.engine.play()?;
        Ok(handle)
    }

    /// Queue and start the idle screen
    pub(super) fn queue_idle(&self) -> Result<MediaHandle> {
        let background = self.backgrounds.resolve(BackgroundKind::Idle)?;
        let text = self.overlay.render_idle(&self.idle_info())?;

        let request = MediaRequest::new(background)
            .with_subtitle(text)
            .with_image_duration(Duration::from_secs(self.settings.durations.idle_duration));

        self.queue_and_play(&request)
    }

    /// Absolute path of the song of an entry
    pub(super) fn song_path(&self, entry: &PlaylistEntry) -> PathBuf {
        self.settings.kara_folder.join(&entry.song.file_path)
    }

    /// Render the transition screen and gather the song media
    pub(super) fn prepare_entry(&self, entry: &PlaylistEntry, song_path: &Path) -> Result<PreparedMedia> {
        let background = self.backgrounds.resolve(BackgroundKind::Transition)?;
        let text = self.overlay.render_transition(entry)?;

        let transition = MediaRequest::new(background)
            .with_subtitle(text)
            .with_image_duration(Duration::from_secs(
                self.settings.durations.transition_duration,
            ));

        Ok(PreparedMedia {
            transition,
            song: media::song_request(song_path, entry.use_instrumental),
        })
    }

    fn idle_info(&self) -> IdleInfo {
        let engine_note = match self.engine.version() {
            Ok(version) if version.starts_with(self.engine.name()) => version,
            Ok(version) => format!("{} {}", self.engine.name(), version),
            Err(e) => {
                warn!("Unable to get {} version: {}", self.engine.name(), e);
                self.engine.name().to_string()
            }
        };

        IdleInfo {
            notes: vec![
                engine_note,
                format!("Dakara player {}", env!("CARGO_PKG_VERSION")),
            ],
        }
    }

    /// Song timing in seconds for `state`
    pub(super) fn timing(&self, state: &PlaybackState) -> u64 {
        if !state.in_song() {
            return 0;
        }

        match self.engine.get_timing_raw() {
            Ok(ms) if ms > 0 => (ms / 1000) as u64,
            Ok(_) => 0,
            Err(e) => {
                warn!("Unable to get timing: {}", e);
                0
            }
        }
    }
}

impl Worker for Orchestrator {
    fn name(&self) -> &str {
        self.shared.engine.name()
    }

    fn load(&mut self) -> Result<()> {
        let kara_folder = &self.shared.settings.kara_folder;
        if !kara_folder.is_dir() {
            return Err(Error::KaraFolderNotFound(kara_folder.clone()));
        }

        self.shared.overlay.load()?;
        self.shared.backgrounds.load()?;

        match self.shared.engine.version() {
            Ok(version) => info!("Using {}", version),
            Err(e) => warn!("Unable to get {} version: {}", self.shared.engine.name(), e),
        }

        self.start_dispatcher()
    }

    fn exit_worker(&mut self) {
        info!("Stopping {}", self.shared.engine.name());

        if let Err(e) = self.shared.engine.stop() {
            error!("Error while stopping {}: {}", self.shared.engine.name(), e);
        }

        let pending_stop = self.shared.pending_stop.lock().take();
        if let Some(handle) = pending_stop {
            debug!("Waiting for the previous stop request");
            let _ = handle.join();
        }

        self.shared.inner.lock().active = None;
        self.shutdown_dispatcher();
    }
}
