//! Command-line interface and REPL

use anyhow::{anyhow, bail, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{ConnectionState, MixerState};

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Connect, optionally overriding the configured connection string
    Connect(Option<String>),
    Disconnect,
    Fader { channel: String, value: f64 },
    Mute { channel: String, muted: bool },
    Pan { channel: String, value: f64 },
    /// Scribble-strip name; may contain spaces
    Name { channel: String, name: String },
    Color { channel: String, color: u8 },
    Scene(u16),
    Sync,
    /// Print the mixer state, as JSON when `json` is set
    State { json: bool },
    Help,
    Quit,
}

fn number(arg: Option<&str>, what: &str) -> Result<f64> {
    let arg = arg.ok_or_else(|| anyhow!("missing {}", what))?;
    arg.parse().map_err(|_| anyhow!("'{}' is not a number", arg))
}

fn channel(arg: Option<&str>) -> Result<String> {
    arg.map(str::to_string).ok_or_else(|| anyhow!("missing channel (e.g. input_1, main)"))
}

/// Parse a prompt line; `Ok(None)` for blank lines
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_lowercase().as_str() {
        "connect" => {
            let rest: Vec<&str> = words.by_ref().collect();
            Some(ReplCommand::Connect((!rest.is_empty()).then(|| rest.join(" "))))
        }
        "disconnect" => Some(ReplCommand::Disconnect),
        "fader" => Some(ReplCommand::Fader {
            channel: channel(words.next())?,
            value: number(words.next(), "level 0..1")?,
        }),
        "pan" => Some(ReplCommand::Pan {
            channel: channel(words.next())?,
            value: number(words.next(), "position -1..1")?,
        }),
        "mute" => {
            let channel = channel(words.next())?;
            let muted = match words.next() {
                Some("on") | Some("1") | Some("true") | None => true,
                Some("off") | Some("0") | Some("false") => false,
                Some(other) => bail!("mute expects on|off, got '{}'", other),
            };
            Some(ReplCommand::Mute { channel, muted })
        }
        "name" => {
            let channel = channel(words.next())?;
            let rest: Vec<&str> = words.by_ref().collect();
            if rest.is_empty() {
                bail!("missing name");
            }
            Some(ReplCommand::Name {
                channel,
                name: rest.join(" "),
            })
        }
        "color" => {
            let channel = channel(words.next())?;
            let arg = words.next().ok_or_else(|| anyhow!("missing color 0..7"))?;
            let color = arg.parse().map_err(|_| anyhow!("'{}' is not a color index", arg))?;
            Some(ReplCommand::Color { channel, color })
        }
        "scene" => {
            let arg = words.next().ok_or_else(|| anyhow!("missing scene number"))?;
            Some(ReplCommand::Scene(
                arg.parse().map_err(|_| anyhow!("'{}' is not a scene number", arg))?,
            ))
        }
        "sync" => Some(ReplCommand::Sync),
        "state" => match words.next() {
            None => Some(ReplCommand::State { json: false }),
            Some("json") => Some(ReplCommand::State { json: true }),
            Some(other) => bail!("state takes no argument or 'json', got '{}'", other),
        },
        "help" | "?" => Some(ReplCommand::Help),
        "quit" | "exit" => Some(ReplCommand::Quit),
        other => bail!("unknown command '{}' (try 'help')", other),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected argument '{}'", extra);
    }
    Ok(command)
}

/// Run the prompt on a blocking thread, forwarding parsed commands
///
/// Ctrl-C / Ctrl-D at the prompt send [`ReplCommand::Quit`].
pub fn spawn_repl() -> Result<mpsc::Receiver<ReplCommand>> {
    let mut rl = DefaultEditor::new()?;
    let (tx, rx) = mpsc::channel(16);

    tokio::task::spawn_blocking(move || loop {
        match rl.readline("mixer> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        let quit = command == ReplCommand::Quit;
                        if tx.blocking_send(command).is_err() || quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{} {}", "error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = tx.blocking_send(ReplCommand::Quit);
                break;
            }
            Err(e) => {
                warn!("REPL read failed: {}", e);
                let _ = tx.blocking_send(ReplCommand::Quit);
                break;
            }
        }
    });

    debug!("REPL started");
    Ok(rx)
}

pub fn print_help() {
    println!("\n{}", "Commands:".bold());
    for (usage, what) in [
        ("connect [conn]", "connect (optionally to another port / host:port)"),
        ("disconnect", "release the console"),
        ("fader <ch> <0..1>", "set a fader, e.g. fader input_1 0.75"),
        ("mute <ch> on|off", "mute or unmute a channel"),
        ("pan <ch> <-1..1>", "set a pan position"),
        ("name <ch> <text>", "rename a channel (up to 12 characters)"),
        ("color <ch> <0..7>", "set a channel's strip color"),
        ("scene <n>", "recall a stored scene"),
        ("sync", "ask the console for its full state"),
        ("state [json]", "print the current mixer state"),
        ("quit", "exit"),
    ] {
        println!("  {:<20} {}", usage.yellow(), what);
    }
    println!("\n  Channels: input_N, aux_N, fx_N, fxsend_N, main\n");
}

pub fn print_state(state: &MixerState) {
    let status = match state.status.state {
        ConnectionState::Connected => "connected".green(),
        ConnectionState::Connecting => "connecting".yellow(),
        ConnectionState::Disconnected => "disconnected".dimmed(),
        ConnectionState::Error => "error".red(),
    };
    println!(
        "\n{} {} ({}) via '{}' - {}",
        state.device.manufacturer.bold(),
        state.device.model.bold(),
        state.device.board,
        state.device.connection,
        status
    );
    if let Some(error) = &state.status.error {
        println!("  {}", error.red());
    }

    for channel in state.channels.values() {
        let pending = if channel.unconfirmed.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = channel.unconfirmed.iter().map(|p| p.as_str()).collect();
            format!(" (unconfirmed: {})", names.join(", ")).yellow().to_string()
        };
        let mute = if channel.mute { "MUTE".red() } else { "    ".normal() };
        let meter = state
            .meters
            .get(&channel.id)
            .map(|level| format!(" meter {:>4.0}%", level * 100.0))
            .unwrap_or_default();
        println!(
            "  {:<10} {:<12} fader {:>5.3}  pan {:>+5.2}  {}{}{}",
            channel.id.to_string().bright_white(),
            channel.name,
            channel.fader,
            channel.pan,
            mute,
            meter,
            pending
        );
    }
    println!();
}

/// Print MIDI ports for picking a connection string
pub fn list_ports_formatted() -> Result<()> {
    let (inputs, outputs) = crate::midi::list_ports()?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    for (title, ports) in [("Input Ports:", inputs), ("Output Ports:", outputs)] {
        println!("\n{}", title.bold());
        if ports.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for port in ports {
            println!("  {}", port.green());
        }
    }
    println!(
        "\nUse a name (or a unique part of it) as the connection, or {} for split ports.\n",
        "\"out|in\"".yellow()
    );
    Ok(())
}
