//! Playback orchestration

pub mod media;
pub mod orchestrator;
pub mod state;

pub use media::PreparedMedia;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use state::{PausedPhase, PlaybackState};
