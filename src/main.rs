//! Mixer GW - remote control for digital mixing consoles
//!
//! Drives a Behringer X Air or Allen & Heath Qu/GLD console over MIDI or OSC
//! from an interactive prompt.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixer_gw::boards::BoardRegistry;
use mixer_gw::cli::{self, ReplCommand};
use mixer_gw::config::AppConfig;
use mixer_gw::events::{EventKind, MixerEvent};
use mixer_gw::session::Session;
use mixer_gw::types::Source;

/// Mixer GW - control a digital mixing console over MIDI or OSC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Board to drive (xair-midi, xair-osc, qu24, gld80, command8); overrides the config
    #[arg(short, long, env = "MIXER_BOARD")]
    board: Option<String>,

    /// MIDI port name or OSC host:port; overrides the config
    #[arg(long, env = "MIXER_CONNECT")]
    connect: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        cli::list_ports_formatted()?;
        return Ok(());
    }

    info!("Starting Mixer GW...");
    let config = load_config(&args).await?;

    let registry = BoardRegistry::with_builtin_boards();
    if !registry.contains(&config.device.board) {
        anyhow::bail!(
            "Unknown board '{}' (available: {})",
            config.device.board,
            registry.ids().join(", ")
        );
    }

    let session = Session::start(&registry, &config.device.board, config.session_options())
        .with_context(|| format!("Failed to start session for '{}'", config.device.board))?;
    log_events(&session);

    run_app(&session, &config).await?;

    session.disconnect().await;
    info!("Mixer GW shutdown complete");
    Ok(())
}

/// Config file, with `--board` / `--connect` taking precedence
async fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if Path::new(&args.config).exists() {
        let config = AppConfig::load(&args.config).await?;
        info!("Configuration file: {}", args.config);
        config
    } else if args.board.is_some() && args.connect.is_some() {
        debug!("No config file at {}, using defaults", args.config);
        AppConfig::default()
    } else {
        anyhow::bail!(
            "Config file {} not found (pass --board and --connect to run without one)",
            args.config
        );
    };

    if let Some(board) = &args.board {
        config.device.board = board.clone();
    }
    if let Some(connection) = &args.connect {
        config.device.connection = connection.clone();
    }
    config.validate()?;
    Ok(config)
}

fn log_events(session: &Session) {
    session.subscribe(
        EventKind::ParameterChanged,
        Arc::new(|event: &MixerEvent| -> anyhow::Result<()> {
            if let MixerEvent::ParameterChanged(change) = event {
                match change.source {
                    Source::Hardware => info!(
                        "🎚️  {}.{} = {} (seq {})",
                        change.channel_id, change.parameter, change.value, change.sequence
                    ),
                    Source::Client => debug!("{}.{} = {} (sent)", change.channel_id, change.parameter, change.value),
                }
            }
            Ok(())
        }),
    );
    session.subscribe(
        EventKind::ConnectionStatusChanged,
        Arc::new(|event: &MixerEvent| -> anyhow::Result<()> {
            if let MixerEvent::ConnectionStatusChanged(status) = event {
                match &status.error {
                    Some(error) => warn!("⚠️  Connection {:?}: {}", status.state, error),
                    None => info!("Connection {:?}", status.state),
                }
            }
            Ok(())
        }),
    );
}

async fn run_app(session: &Session, config: &AppConfig) -> Result<()> {
    let mut connection = config.device.connection.clone();
    if connection.is_empty() {
        info!("No connection configured; use 'connect <port or host:port>'");
    } else if let Err(e) = session.connect(&connection).await {
        warn!("Initial connect failed: {} (retry with 'connect')", e);
    }

    cli::print_help();
    let mut commands = cli::spawn_repl()?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                if command == ReplCommand::Quit {
                    break;
                }
                if let ReplCommand::Connect(Some(target)) = &command {
                    connection = target.clone();
                }
                if let Err(e) = execute(session, &connection, command).await {
                    warn!("{}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping");
                break;
            }
        }
    }
    Ok(())
}

async fn execute(session: &Session, connection: &str, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::Connect(_) => {
            if connection.is_empty() {
                anyhow::bail!("No connection given (connect <port or host:port>)");
            }
            session.connect(connection).await?;
        }
        ReplCommand::Disconnect => session.disconnect().await,
        ReplCommand::Fader { channel, value } => {
            session.set_fader(&channel, value).await?;
        }
        ReplCommand::Mute { channel, muted } => {
            session.set_mute(&channel, muted).await?;
        }
        ReplCommand::Pan { channel, value } => {
            session.set_pan(&channel, value).await?;
        }
        ReplCommand::Name { channel, name } => {
            session.set_channel_name(&channel, &name).await?;
        }
        ReplCommand::Color { channel, color } => {
            session.set_channel_color(&channel, color).await?;
        }
        ReplCommand::Scene(scene) => session.recall_scene(scene).await?,
        ReplCommand::Sync => session.request_full_state().await?,
        ReplCommand::State { json } => match session.state() {
            Some(state) if json => println!("{}", serde_json::to_string_pretty(&state)?),
            Some(state) => cli::print_state(&state),
            None => println!("Not connected ({:?})", session.status().state),
        },
        ReplCommand::Help => cli::print_help(),
        ReplCommand::Quit => {}
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
