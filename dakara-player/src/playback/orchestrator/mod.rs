//! Playback orchestrator
//!
//! Owns the playback state and sequences the idle screen, the transition
//! screen of an entry and its song against the media engine.
//!
//! **Concurrency:**
//! - The state lives behind one mutex; every transition is one critical section
//! - Engine handlers only enqueue events; the dispatcher thread applies them
//!   in arrival order
//! - Callbacks fire after the lock is released, so they may call back into
//!   the orchestrator (except `flush`)
//! - Events of a media that is no longer the active one are ignored

mod control;
mod core;
mod handlers;

pub use self::core::{Orchestrator, OrchestratorSettings};
pub use handlers::NO_DETAILS_MESSAGE;
