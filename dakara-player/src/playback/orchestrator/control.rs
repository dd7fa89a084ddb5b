//! Commands of the playlist controller
//!
//! Each command is one critical section over the playback state. Callbacks
//! produced by a command fire after the lock is released, in order.

use super::core::{Inner, MediaKind, Orchestrator};
use crate::engine::{EngineEvent, EngineEventKind};
use crate::playback::media::PreparedMedia;
use crate::playback::state::{PausedPhase, PlaybackState};
use dakara_common::{PlayerEvent, PlaylistEntry, PlaylistEntryId};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

impl Orchestrator {
    /// Set the entry to play next
    ///
    /// If the song file is missing, `error` then `could_not_play` fire and
    /// the state is unchanged. Otherwise the transition screen starts, or is
    /// only prepared when `autoplay` is false. A prepared entry set while
    /// another one is still started becomes pending once that one ends.
    pub fn set_playlist_entry(&self, entry: impl Into<Arc<PlaylistEntry>>, autoplay: bool) {
        let entry = entry.into();
        let shared = &self.shared;
        let id = entry.id;

        let song_path = shared.song_path(&entry);
        if !song_path.exists() {
            error!("File not found {:?}", song_path);
            shared.fire(could_not_play(id, "File not found".to_string()));
            return;
        }

        let prepared = match shared.prepare_entry(&entry, &song_path) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Unable to prepare entry {}: {}", id, e);
                shared.fire(could_not_play(id, e.to_string()));
                return;
            }
        };

        let events = {
            let mut inner = shared.inner.lock();

            let current_id = inner.state.started_entry().map(|current| current.id);

            if autoplay {
                inner.deferred = None;
                self.start_transition(&mut inner, entry, prepared)
            } else if let Some(current_id) = current_id {
                info!(
                    "Entry {} ({}) pending after entry {}",
                    id,
                    entry.song.display_name(),
                    current_id
                );
                inner.deferred = Some((entry, prepared));
                Vec::new()
            } else {
                info!("Entry {} ({}) pending", id, entry.song.display_name());
                inner.deferred = None;
                inner.state = PlaybackState::SongPending(entry, prepared);
                Vec::new()
            }
        };

        shared.fire(events);
    }

    /// Start the transition of the pending entry
    pub fn play_pending_entry(&self) {
        let events = {
            let mut inner = self.shared.inner.lock();

            match std::mem::take(&mut inner.state) {
                PlaybackState::SongPending(entry, prepared) => {
                    self.start_transition(&mut inner, entry, prepared)
                }
                other => {
                    debug!("No pending entry to play ({})", other.name());
                    inner.state = other;
                    Vec::new()
                }
            }
        };

        self.shared.fire(events);
    }

    fn start_transition(
        &self,
        inner: &mut Inner,
        entry: Arc<PlaylistEntry>,
        prepared: PreparedMedia,
    ) -> Vec<PlayerEvent> {
        let id = entry.id;

        match self.shared.queue_and_play(&prepared.transition) {
            Ok(handle) => {
                info!("Playing transition for entry {} ({})", id, entry.song.display_name());
                inner.active = Some((handle, MediaKind::Transition));
                inner.next_song = Some(prepared.song);
                inner.state = PlaybackState::TransitionPlaying(entry);
                vec![PlayerEvent::StartedTransition {
                    playlist_entry_id: id,
                }]
            }
            Err(e) => {
                error!("Unable to play transition for entry {}: {}", id, e);
                inner.enter_error();
                could_not_play(id, e.to_string())
            }
        }
    }

    /// Display the idle screen
    ///
    /// A pending entry stays pending behind the idle screen.
    pub fn play_idle_screen(&self) {
        let mut inner = self.shared.inner.lock();

        if matches!(inner.state, PlaybackState::Idle | PlaybackState::SongPending(..))
            && matches!(inner.active, Some((_, MediaKind::Idle)))
        {
            debug!("Idle screen already playing");
            return;
        }

        match self.shared.queue_idle() {
            Ok(handle) => {
                info!("Playing idle screen");
                if matches!(inner.state, PlaybackState::SongPending(..)) {
                    inner.active = Some((handle, MediaKind::Idle));
                } else {
                    inner.enter_idle(Some((handle, MediaKind::Idle)));
                }
            }
            Err(e) => {
                error!("Unable to play idle screen: {}", e);
                if matches!(inner.state, PlaybackState::SongPending(..)) {
                    inner.active = None;
                } else {
                    inner.enter_error();
                }
            }
        }
    }

    /// Pause (`true`) or resume (`false`) the current entry
    ///
    /// No-op when already in the requested sub-state or when no entry has
    /// started.
    pub fn pause(&self, paused: bool) {
        let events = {
            let mut inner = self.shared.inner.lock();

            let (entry, next_state) = match (&inner.state, paused) {
                (PlaybackState::TransitionPlaying(entry), true) => (
                    Arc::clone(entry),
                    PlaybackState::Paused {
                        entry: Arc::clone(entry),
                        resume: PausedPhase::Transition,
                    },
                ),
                (PlaybackState::SongPlaying(entry), true) => (
                    Arc::clone(entry),
                    PlaybackState::Paused {
                        entry: Arc::clone(entry),
                        resume: PausedPhase::Song,
                    },
                ),
                (PlaybackState::Paused { entry, resume }, false) => (
                    Arc::clone(entry),
                    match resume {
                        PausedPhase::Transition => {
                            PlaybackState::TransitionPlaying(Arc::clone(entry))
                        }
                        PausedPhase::Song => PlaybackState::SongPlaying(Arc::clone(entry)),
                    },
                ),
                (state, _) => {
                    debug!("Ignoring pause({}) in state {}", paused, state.name());
                    return;
                }
            };

            let command = if paused {
                self.shared.engine.pause()
            } else {
                self.shared.engine.play()
            };
            if let Err(e) = command {
                error!("Unable to {} entry {}: {}", if paused { "pause" } else { "resume" }, entry.id, e);
                return;
            }

            inner.state = next_state;
            let timing = self.shared.timing(&inner.state);
            let playlist_entry_id = entry.id;

            if paused {
                info!("Paused entry {} at {}s", playlist_entry_id, timing);
                vec![PlayerEvent::Paused {
                    playlist_entry_id,
                    timing,
                }]
            } else {
                info!("Resumed entry {} at {}s", playlist_entry_id, timing);
                vec![PlayerEvent::Resumed {
                    playlist_entry_id,
                    timing,
                }]
            }
        };

        self.shared.fire(events);
    }

    /// End the current transition or song as if it reached its end
    pub fn skip(&self) {
        let handle = {
            let inner = self.shared.inner.lock();

            match (inner.state.started_entry(), inner.active) {
                (Some(entry), Some((handle, _))) => {
                    info!("Skipping {} of entry {}", inner.state.name(), entry.id);
                    handle
                }
                _ => {
                    debug!("Nothing to skip ({})", inner.state.name());
                    return;
                }
            }
        };

        // Handled here so the skip is complete when returning
        let events = self.shared.handle_engine_event(EngineEvent {
            handle,
            kind: EngineEventKind::EndReached,
        });
        self.shared.fire(events);
    }

    /// Stop the engine, waiting at most the stop timeout
    ///
    /// Returns `true` when the wait gave up; the stop then goes on in the
    /// background and is joined by `exit_worker`.
    pub fn stop_player(&self) -> bool {
        let engine = Arc::clone(&self.shared.engine);
        let name = engine.name().to_string();
        let timeout = self.shared.settings.stop_timeout;

        self.shared.inner.lock().active = None;

        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("engine-stop".to_string())
            .spawn(move || {
                if let Err(e) = engine.stop() {
                    error!("Error while stopping {}: {}", engine.name(), e);
                }
                let _ = done_tx.send(());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Unable to spawn stop thread, stopping {} in place: {}", name, e);
                if let Err(e) = self.shared.engine.stop() {
                    error!("Error while stopping {}: {}", name, e);
                }
                return false;
            }
        };

        match done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                info!("{} stopped", name);
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                if self.shared.settings.warn_long_exit {
                    warn!("{} takes too long to stop", name);
                }
                *self.shared.pending_stop.lock() = Some(handle);
                true
            }
        }
    }

    /// Song timing in seconds; 0 outside of a song
    pub fn get_timing(&self) -> u64 {
        let inner = self.shared.inner.lock();
        self.shared.timing(&inner.state)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.inner.lock().state.is_paused()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.inner.lock().state.is_idle()
    }

    pub fn in_transition(&self) -> bool {
        self.shared.inner.lock().state.in_transition()
    }

    pub fn get_playing_id(&self) -> Option<PlaylistEntryId> {
        self.shared.inner.lock().state.playing_id()
    }

    /// Snapshot of the playback state
    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state.clone()
    }
}

fn could_not_play(playlist_entry_id: PlaylistEntryId, message: String) -> Vec<PlayerEvent> {
    vec![
        PlayerEvent::Error {
            playlist_entry_id,
            message,
        },
        PlayerEvent::CouldNotPlay { playlist_entry_id },
    ]
}
