//! Engine event handling
//!
//! | state | event | next state |
//! |---|---|---|
//! | transition | end reached | song (song media queued) |
//! | idle | end reached | idle (idle media queued again) |
//! | song | end reached | idle |
//! | any | engine error | idle |
//!
//! A paused entry is handled like the phase it was paused in. Leaving an
//! entry goes to song pending instead of idle when another entry was set
//! without autoplay meanwhile.

use super::core::{Inner, MediaKind, Shared};
use crate::engine::{EngineEvent, EngineEventKind};
use crate::playback::media;
use crate::playback::state::{PausedPhase, PlaybackState};
use dakara_common::PlayerEvent;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Error message used when the engine kept no details
pub const NO_DETAILS_MESSAGE: &str = "No details, consult player logs";

impl Shared {
    /// Apply an engine event, returning the callbacks to fire
    pub(super) fn handle_engine_event(&self, event: EngineEvent) -> Vec<PlayerEvent> {
        let mut inner = self.inner.lock();

        let kind = match inner.active {
            Some((handle, kind)) if handle == event.handle => kind,
            _ => {
                debug!("Ignoring {:?} of a media no longer active", event);
                return Vec::new();
            }
        };

        match event.kind {
            EngineEventKind::EndReached => self.on_end_reached(&mut inner, kind),
            EngineEventKind::EngineError => self.on_engine_error(&mut inner, kind),
        }
    }

    fn on_end_reached(&self, inner: &mut Inner, kind: MediaKind) -> Vec<PlayerEvent> {
        match &inner.state {
            PlaybackState::TransitionPlaying(entry)
            | PlaybackState::Paused {
                entry,
                resume: PausedPhase::Transition,
            } => {
                let entry = Arc::clone(entry);
                let id = entry.id;
                let request = match inner.next_song.take() {
                    Some(request) => request,
                    None => media::song_request(&self.song_path(&entry), entry.use_instrumental),
                };

                match self.queue_and_play(&request) {
                    Ok(handle) => {
                        info!("Playing song of entry {} ({})", id, entry.song.display_name());
                        inner.active = Some((handle, MediaKind::Song));
                        inner.state = PlaybackState::SongPlaying(entry);
                        vec![PlayerEvent::StartedSong {
                            playlist_entry_id: id,
                        }]
                    }
                    Err(e) => {
                        error!("Unable to play song of entry {}: {}", id, e);
                        inner.enter_error();
                        vec![
                            PlayerEvent::Finished {
                                playlist_entry_id: id,
                            },
                            PlayerEvent::Error {
                                playlist_entry_id: id,
                                message: e.to_string(),
                            },
                        ]
                    }
                }
            }

            PlaybackState::SongPlaying(entry)
            | PlaybackState::Paused {
                entry,
                resume: PausedPhase::Song,
            } => {
                let id = entry.id;
                info!("Song of entry {} finished", id);
                inner.enter_idle(None);
                vec![PlayerEvent::Finished {
                    playlist_entry_id: id,
                }]
            }

            // Idle screen looping, possibly under a pending entry
            PlaybackState::Idle | PlaybackState::SongPending(..) if kind == MediaKind::Idle => {
                debug!("Idle screen ended, playing it again");
                match self.queue_idle() {
                    Ok(handle) => inner.active = Some((handle, MediaKind::Idle)),
                    Err(e) => {
                        error!("Unable to play idle screen: {}", e);
                        if matches!(inner.state, PlaybackState::SongPending(..)) {
                            inner.active = None;
                        } else {
                            inner.enter_error();
                        }
                    }
                }
                Vec::new()
            }

            state => {
                warn!("Unexpected end of {:?} media in state {}", kind, state.name());
                Vec::new()
            }
        }
    }

    fn on_engine_error(&self, inner: &mut Inner, kind: MediaKind) -> Vec<PlayerEvent> {
        let message = self
            .engine
            .last_error_message()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| NO_DETAILS_MESSAGE.to_string());

        let entry = match kind {
            MediaKind::Transition | MediaKind::Song => inner.state.started_entry().cloned(),
            MediaKind::Idle => None,
        };

        let Some(entry) = entry else {
            error!("{} error: {}", self.engine.name(), message);
            inner.active = None;
            if !matches!(inner.state, PlaybackState::SongPending(..)) {
                inner.enter_idle(None);
            }
            return Vec::new();
        };

        let id = entry.id;
        error!("Unable to play entry {} ({}): {}", id, entry.song.display_name(), message);
        inner.enter_idle(None);

        vec![
            PlayerEvent::Finished {
                playlist_entry_id: id,
            },
            PlayerEvent::Error {
                playlist_entry_id: id,
                message,
            },
        ]
    }
}
