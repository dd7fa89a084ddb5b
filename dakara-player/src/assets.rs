//! Templates and backgrounds bundled into the binary
//!
//! Used when no custom file is configured or found. Backgrounds are written
//! to a temporary directory on load since the media engine opens them by
//! path.

pub const TRANSITION_TEMPLATE: &str = include_str!("../assets/templates/transition.ass");
pub const IDLE_TEMPLATE: &str = include_str!("../assets/templates/idle.ass");

pub const TRANSITION_BACKGROUND: &[u8] = include_bytes!("../assets/backgrounds/transition.png");
pub const IDLE_BACKGROUND: &[u8] = include_bytes!("../assets/backgrounds/idle.png");
