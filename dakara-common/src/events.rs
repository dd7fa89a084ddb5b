//! Event types for the Dakara player
//!
//! Value form of every notification the player emits towards the playlist
//! controller. The callback registry can forward them over a channel so the
//! controller consumes them from its own task.

use crate::playlist::PlaylistEntryId;
use serde::{Deserialize, Serialize};

/// Player notifications
///
/// Each variant mirrors one named callback of the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Transition screen of an entry started
    StartedTransition { playlist_entry_id: PlaylistEntryId },

    /// Song of an entry started
    StartedSong { playlist_entry_id: PlaylistEntryId },

    /// Entry was rejected before anything was played
    CouldNotPlay { playlist_entry_id: PlaylistEntryId },

    /// Entry playback ended (naturally, skipped, or on engine error)
    Finished { playlist_entry_id: PlaylistEntryId },

    /// Playback paused
    Paused {
        playlist_entry_id: PlaylistEntryId,
        /// Song timing in seconds
        timing: u64,
    },

    /// Playback resumed
    Resumed {
        playlist_entry_id: PlaylistEntryId,
        /// Song timing in seconds
        timing: u64,
    },

    /// Error attached to an entry
    Error {
        playlist_entry_id: PlaylistEntryId,
        message: String,
    },
}

impl PlayerEvent {
    /// Entry the event refers to
    pub fn playlist_entry_id(&self) -> PlaylistEntryId {
        match self {
            PlayerEvent::StartedTransition { playlist_entry_id }
            | PlayerEvent::StartedSong { playlist_entry_id }
            | PlayerEvent::CouldNotPlay { playlist_entry_id }
            | PlayerEvent::Finished { playlist_entry_id }
            | PlayerEvent::Paused { playlist_entry_id, .. }
            | PlayerEvent::Resumed { playlist_entry_id, .. }
            | PlayerEvent::Error { playlist_entry_id, .. } => *playlist_entry_id,
        }
    }

    /// Callback name associated with the event
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::StartedTransition { .. } => "started_transition",
            PlayerEvent::StartedSong { .. } => "started_song",
            PlayerEvent::CouldNotPlay { .. } => "could_not_play",
            PlayerEvent::Finished { .. } => "finished",
            PlayerEvent::Paused { .. } => "paused",
            PlayerEvent::Resumed { .. } => "resumed",
            PlayerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let event = PlayerEvent::Paused {
            playlist_entry_id: PlaylistEntryId(3),
            timing: 12,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "Paused", "playlist_entry_id": 3, "timing": 12})
        );
    }

    #[test]
    fn test_entry_id_and_name() {
        let event = PlayerEvent::Error {
            playlist_entry_id: PlaylistEntryId(9),
            message: "File not found".to_string(),
        };

        assert_eq!(event.playlist_entry_id(), PlaylistEntryId(9));
        assert_eq!(event.name(), "error");
    }
}
