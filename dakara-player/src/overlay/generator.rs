//! Template based overlay generator
//!
//! Templates use the Jinja syntax. The transition template receives the
//! playlist entry (`id`, `song`, `owner`, `use_instrumental`) and the idle
//! template receives `notes`. Printed values are escaped for ASS; a missing
//! value prints nothing.
//!
//! **Filters:**
//! - `icon`: Font Awesome icon name to its glyph
//! - `duration`: seconds to `m:ss`

use super::{icons, IdleInfo, TextOverlayService};
use crate::assets;
use crate::error::{Error, Result};
use dakara_common::config::TemplatesConfig;
use dakara_common::PlaylistEntry;
use minijinja::{context, Environment, ErrorKind, Output, State, Value};
use std::borrow::Cow;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;
use tracing::{debug, warn};

pub const TRANSITION_TEMPLATE_NAME: &str = "transition.ass";
pub const IDLE_TEMPLATE_NAME: &str = "idle.ass";

const TRANSITION_TEXT_NAME: &str = "transition.ass";
const IDLE_TEXT_NAME: &str = "idle.ass";

struct LoadedTemplates {
    env: Environment<'static>,

    /// Rendered overlays; removed on drop
    output_dir: TempDir,
}

/// Renders overlays from custom or bundled templates
///
/// A template is looked up in the custom directory, under its configured
/// name or its default name. The bundled template is used otherwise.
pub struct TextGenerator {
    config: TemplatesConfig,
    loaded: OnceLock<LoadedTemplates>,
}

impl TextGenerator {
    pub fn new(config: TemplatesConfig) -> Self {
        Self {
            config,
            loaded: OnceLock::new(),
        }
    }

    /// Directory holding the rendered overlays, once loaded
    pub fn output_directory(&self) -> Option<&Path> {
        self.loaded.get().map(|loaded| loaded.output_dir.path())
    }

    fn template_source(
        &self,
        screen: &str,
        configured: Option<&str>,
        default_name: &str,
        bundled: &'static str,
    ) -> Result<Cow<'static, str>> {
        match (self.config.directory.as_deref(), configured) {
            (Some(directory), name) => {
                let custom_path = directory.join(name.unwrap_or(default_name));
                if custom_path.is_file() {
                    debug!("Loading custom {} template file {:?}", screen, custom_path);
                    return Ok(Cow::Owned(std::fs::read_to_string(&custom_path)?));
                }
                warn!(
                    "{} template file not found {:?}, using default one",
                    screen, custom_path
                );
            }
            (None, Some(name)) => {
                warn!(
                    "{} template name {:?} set without a directory, using default one",
                    screen, name
                );
            }
            (None, None) => {}
        }

        debug!("Loading default {} template", screen);
        Ok(Cow::Borrowed(bundled))
    }

    fn environment(&self) -> Result<Environment<'static>> {
        let mut env = Environment::new();
        env.set_formatter(ass_formatter);
        env.add_filter("icon", |name: Option<String>| {
            icons::glyph(name.as_deref().unwrap_or_default()).to_string()
        });
        env.add_filter("duration", |seconds: Option<u64>| {
            seconds.map(format_duration).unwrap_or_default()
        });

        let transition = self.template_source(
            "transition",
            self.config.transition_template_name.as_deref(),
            TRANSITION_TEMPLATE_NAME,
            assets::TRANSITION_TEMPLATE,
        )?;
        env.add_template_owned("transition", transition)?;

        let idle = self.template_source(
            "idle",
            self.config.idle_template_name.as_deref(),
            IDLE_TEMPLATE_NAME,
            assets::IDLE_TEMPLATE,
        )?;
        env.add_template_owned("idle", idle)?;

        Ok(env)
    }

    fn loaded(&self) -> Result<&LoadedTemplates> {
        self.loaded
            .get()
            .ok_or_else(|| Error::InvalidState("text generator is not loaded".to_string()))
    }

    fn render(&self, screen: &str, text_name: &str, ctx: Value) -> Result<PathBuf> {
        let loaded = self.loaded()?;
        let text = loaded.env.get_template(screen)?.render(ctx)?;

        let path = loaded.output_dir.path().join(text_name);
        std::fs::write(&path, text)?;
        debug!("Created text file {:?}", path);
        Ok(path)
    }
}

/// Print values escaped for ASS, missing values as nothing
fn ass_formatter(
    out: &mut Output<'_>,
    _state: &State<'_, '_>,
    value: &Value,
) -> std::result::Result<(), minijinja::Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(());
    }

    out.write_str(&escape_ass(&value.to_string()))
        .map_err(|_| minijinja::Error::new(ErrorKind::WriteFailure, "unable to write overlay text"))
}

/// Escape override braces, backslashes and line breaks
fn escape_ass(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}

/// Format seconds as `m:ss`
fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

impl TextOverlayService for TextGenerator {
    fn load(&self) -> Result<()> {
        if self.loaded.get().is_some() {
            return Ok(());
        }

        let env = self.environment()?;

        let output_dir = tempfile::Builder::new().suffix(".dakara").tempdir()?;
        debug!("Created temporary directory {:?}", output_dir.path());

        // A concurrent load won the race; its templates are equivalent
        let _ = self.loaded.set(LoadedTemplates { env, output_dir });

        Ok(())
    }

    fn render_idle(&self, info: &IdleInfo) -> Result<PathBuf> {
        self.render("idle", IDLE_TEXT_NAME, context! { notes => &info.notes })
    }

    fn render_transition(&self, entry: &PlaylistEntry) -> Result<PathBuf> {
        self.render(
            "transition",
            TRANSITION_TEXT_NAME,
            Value::from_serialize(entry),
        )
    }
}
