//! Song media preparation
//!
//! Companion files are looked up next to the song file, sharing its stem:
//! subtitles (`.ass`, then `.ssa`) and, for instrumental requests, a single
//! audio file.

use crate::engine::{AudioSelection, MediaRequest};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SUBTITLE_EXTENSIONS: &[&str] = &["ass", "ssa"];

const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "ac3", "flac", "m4a", "mka", "mp3", "oga", "ogg", "opus", "wav", "wma",
];

/// Audio track holding the instrumental version when no file is found
pub const INSTRUMENTAL_TRACK: u32 = 2;

/// Media prepared for an entry, ready to be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMedia {
    pub transition: MediaRequest,
    pub song: MediaRequest,
}

/// Subtitle file of a song
pub fn find_subtitle(song_path: &Path) -> Option<PathBuf> {
    SUBTITLE_EXTENSIONS
        .iter()
        .map(|extension| song_path.with_extension(extension))
        .find(|candidate| candidate != song_path && candidate.is_file())
}

/// Audio files sharing the song stem, sorted by name
pub fn find_audio_files(song_path: &Path) -> Vec<PathBuf> {
    let (Some(directory), Some(stem)) = (song_path.parent(), song_path.file_stem()) else {
        return Vec::new();
    };

    let Ok(read_dir) = std::fs::read_dir(directory) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|dir_entry| dir_entry.ok().map(|dir_entry| dir_entry.path()))
        .filter(|path| path != song_path && path.is_file())
        .filter(|path| path.file_stem() == Some(stem))
        .filter(|path| {
            path.extension()
                .and_then(|extension| extension.to_str())
                .map(|extension| AUDIO_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}

/// Instrumental audio file of a song; only accepted if it is the only one
pub fn instrumental_file(song_path: &Path) -> Option<PathBuf> {
    let mut files = find_audio_files(song_path);

    if files.len() == 1 {
        files.pop()
    } else {
        if files.len() > 1 {
            debug!("Several audio files found for {:?}, none used", song_path);
        }
        None
    }
}

/// Engine request for a song
pub fn song_request(song_path: &Path, use_instrumental: bool) -> MediaRequest {
    let mut request = MediaRequest::new(song_path);

    if let Some(subtitle) = find_subtitle(song_path) {
        debug!("Using subtitle file {:?}", subtitle);
        request = request.with_subtitle(subtitle);
    }

    if use_instrumental {
        let audio = match instrumental_file(song_path) {
            Some(file) => {
                info!("Requesting to play instrumental file {:?}", file);
                AudioSelection::File(file)
            }
            None => {
                info!(
                    "No instrumental file found, requesting to play audio track {}",
                    INSTRUMENTAL_TRACK
                );
                AudioSelection::Track(INSTRUMENTAL_TRACK)
            }
        };
        request = request.with_audio(audio);
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_ass_preferred_over_ssa() {
        let dir = TempDir::new().unwrap();
        let song = touch(&dir, "song.mkv");
        touch(&dir, "song.ssa");
        let ass = touch(&dir, "song.ass");

        assert_eq!(find_subtitle(&song), Some(ass));
    }

    #[test]
    fn test_ssa_used_alone() {
        let dir = TempDir::new().unwrap();
        let song = touch(&dir, "song.mkv");
        let ssa = touch(&dir, "song.ssa");

        assert_eq!(find_subtitle(&song), Some(ssa));
    }

    #[test]
    fn test_plain_request_without_companions() {
        let dir = TempDir::new().unwrap();
        let song = touch(&dir, "song.mkv");
        touch(&dir, "other.ass");

        let request = song_request(&song, false);
        assert_eq!(request, MediaRequest::new(&song));
    }

    #[test]
    fn test_instrumental_file_used() {
        let dir = TempDir::new().unwrap();
        let song = touch(&dir, "song.mkv");
        let audio = touch(&dir, "song.ogg");
        touch(&dir, "song.ass");

        let request = song_request(&song, true);
        assert_eq!(request.audio, AudioSelection::File(audio));
        assert_eq!(request.subtitles.len(), 1);
    }

    #[test]
    fn test_instrumental_track_when_ambiguous() {
        let dir = TempDir::new().unwrap();
        let song = touch(&dir, "song.mkv");
        touch(&dir, "song.ogg");
        touch(&dir, "song.mp3");

        let request = song_request(&song, true);
        assert_eq!(request.audio, AudioSelection::Track(INSTRUMENTAL_TRACK));
    }

    #[test]
    fn test_song_audio_file_is_not_its_own_instrumental() {
        let dir = TempDir::new().unwrap();
        let song = touch(&dir, "song.mp3");

        assert_eq!(instrumental_file(&song), None);
    }
}
