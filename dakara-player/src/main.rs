//! Dakara player - main entry point
//!
//! Minimal playlist controller around the player library: plays the songs
//! given on the command line one after the other, each preceded by its
//! transition screen, then shows the idle screen until interrupted.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use dakara_common::config::{self, LoggingConfig, PlayerConfig, TomlConfig, CONFIG_ENV_VAR};
use dakara_common::{PlayerEvent, PlaylistEntry};
use dakara_player::background::BackgroundLoader;
use dakara_player::overlay::TextGenerator;
use dakara_player::worker::{self, ExitWatchdog};
use dakara_player::{Orchestrator, OrchestratorSettings};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::block_in_place;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for dakara-player
#[derive(Parser, Debug)]
#[command(name = "dakara-player")]
#[command(about = "Karaoke player for Dakara")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Songs to play, relative to the karaoke folder
    songs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR)
        .context("Failed to locate the configuration file")?;
    let config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration {:?}", config_path))?;

    init_logging(&config.logging, args.debug)?;

    info!(
        "Starting Dakara player {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );
    info!("Configuration: {:?}", config_path);

    let player_config = config.player;
    let exit_watchdog = ExitWatchdog::from(player_config.watchdog);

    let orchestrator = block_in_place(|| {
        worker::start(|| build_orchestrator(&player_config), exit_watchdog)
    })
    .context("Failed to start the player")?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    orchestrator.callbacks().forward_to(event_tx);

    let player = Orchestrator::clone(&orchestrator);
    let mut playlist: VecDeque<PlaylistEntry> = args
        .songs
        .into_iter()
        .zip(1i64..)
        .map(|(path, id)| PlaylistEntry::new(id, path))
        .collect();

    block_in_place(|| play_next(&player, &mut playlist));
    run(&player, &mut playlist, event_rx).await;

    // Engine stop, watched by the exit watchdog
    block_in_place(|| orchestrator.exit());

    info!("Dakara player stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig, debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(unix)]
fn build_orchestrator(config: &PlayerConfig) -> dakara_player::Result<Orchestrator> {
    use dakara_player::engine::mpv::{MpvEngine, MpvOptions};

    let engine = MpvEngine::start(&MpvOptions::from_config(config))?;
    let overlay = TextGenerator::new(config.templates.clone());
    let backgrounds = BackgroundLoader::new(config.backgrounds.clone());

    Ok(Orchestrator::new(
        OrchestratorSettings::from(config),
        Arc::new(engine),
        Arc::new(overlay),
        Arc::new(backgrounds),
    ))
}

#[cfg(not(unix))]
fn build_orchestrator(_config: &PlayerConfig) -> dakara_player::Result<Orchestrator> {
    Err(dakara_player::Error::MediaPlayerNotAvailable("mpv".to_string()))
}

/// Start the next song, or the idle screen once the playlist is empty
fn play_next(player: &Orchestrator, playlist: &mut VecDeque<PlaylistEntry>) {
    match playlist.pop_front() {
        Some(entry) => player.set_playlist_entry(entry, true),
        None => player.play_idle_screen(),
    }
}

/// Controller loop: react to player events until interrupted
async fn run(
    player: &Orchestrator,
    playlist: &mut VecDeque<PlaylistEntry>,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
) {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Player event channel closed");
                    break;
                };

                match event {
                    PlayerEvent::Finished { .. } | PlayerEvent::CouldNotPlay { .. } => {
                        block_in_place(|| play_next(player, playlist));
                    }
                    PlayerEvent::Error { playlist_entry_id, message } => {
                        error!("Entry {}: {}", playlist_entry_id, message);
                    }
                    other => info!("{:?}", other),
                }
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
