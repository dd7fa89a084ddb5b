//! Playlist entry model
//!
//! A playlist entry is one song request handed to the player by the playlist
//! controller. The player never modifies it: entries are shared as
//! `Arc<PlaylistEntry>` for the duration of their playback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque playlist entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistEntryId(pub i64);

impl fmt::Display for PlaylistEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PlaylistEntryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One song request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: PlaylistEntryId,

    pub song: Song,

    /// User who requested the song
    #[serde(default)]
    pub owner: Option<User>,

    /// Play the instrumental version of the song if available
    #[serde(default)]
    pub use_instrumental: bool,
}

impl PlaylistEntry {
    /// Create an entry with a bare song (no display metadata)
    pub fn new(id: impl Into<PlaylistEntryId>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            song: Song {
                title: String::new(),
                file_path: file_path.into(),
                artists: Vec::new(),
                works: Vec::new(),
                duration: None,
            },
            owner: None,
            use_instrumental: false,
        }
    }
}

/// Song descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(default)]
    pub title: String,

    /// Path of the song file, relative to the karaoke folder
    pub file_path: PathBuf,

    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub works: Vec<SongWork>,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u64>,
}

impl Song {
    /// Title used in log messages: the song title, or the file path when untitled
    pub fn display_name(&self) -> String {
        if self.title.is_empty() {
            self.file_path.display().to_string()
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// Link between a song and a work (anime, game, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongWork {
    pub work: Work,

    /// Link type code (OP, ED, IN, IS)
    #[serde(default)]
    pub link_type: String,

    #[serde(default)]
    pub link_type_number: Option<u32>,

    #[serde(default)]
    pub episodes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub title: String,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub work_type: Option<WorkType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkType {
    pub name: String,

    /// Icon name in the overlay icon font
    #[serde(default)]
    pub icon_name: Option<String>,
}
