//! Playback state
//!
//! Single source of truth of what the player is doing. Every other view
//! (`in_transition`, `playing_id`, ...) is a projection of the state and
//! cannot be set independently.

use super::media::PreparedMedia;
use dakara_common::{PlaylistEntry, PlaylistEntryId};
use std::sync::Arc;

/// Phase a paused entry returns to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausedPhase {
    Transition,
    Song,
}

/// Current playback state
#[derive(Debug, Clone, Default)]
pub enum PlaybackState {
    /// No entry, idle screen (or nothing) displayed
    #[default]
    Idle,

    /// Transition screen of the entry displayed
    TransitionPlaying(Arc<PlaylistEntry>),

    /// Entry accepted without autoplay; media prepared, nothing started
    SongPending(Arc<PlaylistEntry>, PreparedMedia),

    /// Song of the entry playing
    SongPlaying(Arc<PlaylistEntry>),

    /// Entry paused during its transition or its song
    Paused {
        entry: Arc<PlaylistEntry>,
        resume: PausedPhase,
    },

    /// An engine command failed, nothing is displayed
    Error,
}

impl PlaybackState {
    /// Current entry, if any
    pub fn entry(&self) -> Option<&Arc<PlaylistEntry>> {
        match self {
            PlaybackState::TransitionPlaying(entry)
            | PlaybackState::SongPending(entry, _)
            | PlaybackState::SongPlaying(entry)
            | PlaybackState::Paused { entry, .. } => Some(entry),
            PlaybackState::Idle | PlaybackState::Error => None,
        }
    }

    /// Entry whose transition or song has started
    pub fn started_entry(&self) -> Option<&Arc<PlaylistEntry>> {
        match self {
            PlaybackState::SongPending(..) => None,
            other => other.entry(),
        }
    }

    pub fn playing_id(&self) -> Option<PlaylistEntryId> {
        self.entry().map(|entry| entry.id)
    }

    pub fn in_transition(&self) -> bool {
        matches!(
            self,
            PlaybackState::TransitionPlaying(_)
                | PlaybackState::Paused {
                    resume: PausedPhase::Transition,
                    ..
                }
        )
    }

    /// Whether the song timing is meaningful
    pub fn in_song(&self) -> bool {
        matches!(
            self,
            PlaybackState::SongPlaying(_)
                | PlaybackState::Paused {
                    resume: PausedPhase::Song,
                    ..
                }
        )
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused { .. })
    }

    /// True when no entry is current (idle screen or error)
    pub fn is_idle(&self) -> bool {
        self.playing_id().is_none()
    }

    /// State name for logs
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::TransitionPlaying(_) => "transition",
            PlaybackState::SongPending(..) => "pending",
            PlaybackState::SongPlaying(_) => "song",
            PlaybackState::Paused { .. } => "paused",
            PlaybackState::Error => "error",
        }
    }
}
