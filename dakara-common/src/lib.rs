//! # Dakara Common Library
//!
//! Shared code for the Dakara player crates including:
//! - Playlist entry model (as handed over by the playlist controller)
//! - Player event types (callback notifications in value form)
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod playlist;

pub use error::{Error, Result};
pub use events::PlayerEvent;
pub use playlist::{PlaylistEntry, PlaylistEntryId, Song};
