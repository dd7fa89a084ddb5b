//! # Dakara Player Library
//!
//! Karaoke playback client driving a native media player.
//!
//! **Purpose:** Sequence the idle screen, the transition screen of each
//! playlist entry and its song, and relay media player events to the
//! playlist controller as callbacks.
//!
//! **Architecture:** A playback orchestrator (state machine) drives a
//! [`engine::MediaEngine`] (mpv over its JSON IPC socket) and runs as a
//! [`worker::Worker`] whose teardown is watched by a [`watchdog::Watchdog`].

pub mod assets;
pub mod background;
pub mod callbacks;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod playback;
pub mod watchdog;
pub mod worker;

pub use callbacks::Callbacks;
pub use error::{Error, Result};
pub use playback::{Orchestrator, OrchestratorSettings, PlaybackState};
