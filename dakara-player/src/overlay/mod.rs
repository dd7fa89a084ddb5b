//! Text overlays displayed over the idle and transition screens
//!
//! Overlays are subtitle files rendered from templates. The orchestrator
//! asks for one before queuing a screen and attaches it to the background
//! media as a subtitle track.

mod generator;
pub mod icons;

pub use generator::{TextGenerator, IDLE_TEMPLATE_NAME, TRANSITION_TEMPLATE_NAME};

use crate::error::Result;
use dakara_common::PlaylistEntry;
use std::path::PathBuf;

/// Data shown on the idle screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdleInfo {
    /// Free text lines (player and engine versions)
    pub notes: Vec<String>,
}

/// Overlay text producer
pub trait TextOverlayService: Send + Sync {
    /// Load templates; fails with `TemplateNotFound` or `Template`
    fn load(&self) -> Result<()>;

    /// Render the idle screen overlay, returning the subtitle file path
    fn render_idle(&self, info: &IdleInfo) -> Result<PathBuf>;

    /// Render the transition screen overlay of `entry`
    fn render_transition(&self, entry: &PlaylistEntry) -> Result<PathBuf>;
}
