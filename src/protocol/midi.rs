//! MIDI transport over midir
//!
//! Outbound messages are written under a single output lock, so the four
//! Control Changes of an NRPN always leave back to back. Inbound bytes are
//! pushed from the midir callback thread into a channel and reassembled into
//! logical messages on the async side.

use async_trait::async_trait;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{ProtocolAdapter, WireMessage};
use crate::error::{MixerError, Result};
use crate::midi::format_hex;
use crate::midi::nrpn::{Feed, NrpnAssembler};
use crate::midi::MidiMessage;

/// Raw bytes stamped with their arrival time
type Inbound = (Instant, Vec<u8>);

const INBOUND_CAPACITY: usize = 1024;

/// Anything that accepts raw MIDI bytes
trait MidiSink: Send {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), String>;
}

impl MidiSink for MidiOutputConnection {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), String> {
        self.send(bytes).map_err(|e| e.to_string())
    }
}

/// Split `"out|in"` into its halves; a single name is used for both directions
fn split_ports(target: &str) -> (&str, &str) {
    match target.split_once('|') {
        Some((out, input)) => (out.trim(), input.trim()),
        None => (target.trim(), target.trim()),
    }
}

/// Find an input port by case-insensitive substring
fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(midir::MidiInputPort, String)> {
    let pattern = pattern.to_lowercase();
    midi_in.ports().into_iter().find_map(|port| {
        let name = midi_in.port_name(&port).ok()?;
        name.to_lowercase().contains(&pattern).then_some((port, name))
    })
}

/// Find an output port by case-insensitive substring
fn find_output_port(midi_out: &MidiOutput, pattern: &str) -> Option<(midir::MidiOutputPort, String)> {
    let pattern = pattern.to_lowercase();
    midi_out.ports().into_iter().find_map(|port| {
        let name = midi_out.port_name(&port).ok()?;
        name.to_lowercase().contains(&pattern).then_some((port, name))
    })
}

/// MIDI port pair with NRPN-aware framing
pub struct MidiAdapter {
    client_name: String,
    output: Mutex<Option<Box<dyn MidiSink>>>,
    input: Mutex<Option<MidiInputConnection<()>>>,
    inbound: tokio::sync::Mutex<Option<mpsc::Receiver<Inbound>>>,
    assembler: Mutex<NrpnAssembler>,
}

impl MidiAdapter {
    /// `client_name` is what the OS shows for our end of the connection
    pub fn new(client_name: impl Into<String>, nrpn_timeout: Duration) -> Self {
        Self {
            client_name: client_name.into(),
            output: Mutex::new(None),
            input: Mutex::new(None),
            inbound: tokio::sync::Mutex::new(None),
            assembler: Mutex::new(NrpnAssembler::new(nrpn_timeout)),
        }
    }

    fn open_output(&self, pattern: &str) -> Result<()> {
        let midi_out = MidiOutput::new(&format!("{}-Out", self.client_name))
            .map_err(|e| MixerError::Connection(format!("failed to create MIDI output: {}", e)))?;
        let (port, name) = find_output_port(&midi_out, pattern)
            .ok_or_else(|| MixerError::Connection(format!("output port '{}' not found", pattern)))?;
        let conn = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| MixerError::Connection(format!("failed to open output '{}': {}", name, e)))?;

        *self.output.lock() = Some(Box::new(conn));
        info!("MIDI output connected: {}", name);
        Ok(())
    }

    fn open_input(&self, pattern: &str) -> Result<mpsc::Receiver<Inbound>> {
        let mut midi_in = MidiInput::new(&format!("{}-In", self.client_name))
            .map_err(|e| MixerError::Connection(format!("failed to create MIDI input: {}", e)))?;
        // SysEx carries the full-state replies
        midi_in.ignore(Ignore::None);
        let (port, name) = find_input_port(&midi_in, pattern)
            .ok_or_else(|| MixerError::Connection(format!("input port '{}' not found", pattern)))?;

        let (tx, rx) = mpsc::channel::<Inbound>(INBOUND_CAPACITY);
        let conn = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| {
                    // Never block the driver thread
                    if tx.try_send((Instant::now(), data.to_vec())).is_err() {
                        warn!("MIDI inbound queue full, dropping {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| MixerError::Connection(format!("failed to open input '{}': {}", name, e)))?;

        *self.input.lock() = Some(conn);
        info!("MIDI input connected: {}", name);
        Ok(rx)
    }
}

#[async_trait]
impl ProtocolAdapter for MidiAdapter {
    fn name(&self) -> &str {
        "midi"
    }

    async fn open(&self, target: &str) -> Result<()> {
        self.close().await;

        let (out_pattern, in_pattern) = split_ports(target);
        if out_pattern.is_empty() || in_pattern.is_empty() {
            return Err(MixerError::Connection(format!("invalid MIDI connection string '{}'", target)));
        }

        self.open_output(out_pattern)?;
        let rx = match self.open_input(in_pattern) {
            Ok(rx) => rx,
            Err(e) => {
                self.output.lock().take();
                return Err(e);
            }
        };
        *self.inbound.lock().await = Some(rx);
        Ok(())
    }

    async fn close(&self) {
        // Dropping the input connection stops the callback and closes the channel
        let had_input = self.input.lock().take().is_some();
        let had_output = self.output.lock().take().is_some();
        self.inbound.lock().await.take();
        self.assembler.lock().reset();
        if had_input || had_output {
            debug!("MIDI ports closed");
        }
    }

    async fn send(&self, message: &WireMessage) -> Result<()> {
        let frames: Vec<Vec<u8>> = match message {
            WireMessage::Midi(m) => vec![m.encode()],
            WireMessage::Nrpn(n) => n.to_messages().iter().map(MidiMessage::encode).collect(),
            WireMessage::Osc(m) => {
                return Err(MixerError::Translation(format!(
                    "OSC message {} cannot be sent over MIDI",
                    m.addr
                )))
            }
        };

        let mut output = self.output.lock();
        let sink = output
            .as_mut()
            .ok_or_else(|| MixerError::Connection("MIDI output not open".into()))?;
        for frame in &frames {
            sink.write(frame)
                .map_err(|e| MixerError::Connection(format!("MIDI send failed: {}", e)))?;
        }
        debug!("MIDI TX -> {}", message);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<WireMessage>> {
        let mut inbound = self.inbound.lock().await;
        let Some(rx) = inbound.as_mut() else {
            return Ok(None);
        };

        loop {
            let Some((at, bytes)) = rx.recv().await else {
                return Ok(None);
            };
            trace!("MIDI RX <- {}", format_hex(&bytes));
            let msg = MidiMessage::parse(&bytes)?;
            let fed = self.assembler.lock().feed(msg, at);
            match fed {
                Feed::Complete(nrpn) => return Ok(Some(WireMessage::Nrpn(nrpn))),
                Feed::Passthrough(msg) => return Ok(Some(WireMessage::Midi(msg))),
                Feed::Pending | Feed::Discarded => continue,
            }
        }
    }
}
