//! MIDI utilities and message types
//!
//! Provides MIDI message parsing and encoding for the console protocols, plus
//! NRPN sequence handling in [`nrpn`].

pub mod nrpn;

use std::fmt;

use crate::error::MixerError;

/// Control Change numbers used by NRPN sequences
pub mod cc {
    pub const NRPN_MSB: u8 = 0x63; // 99
    pub const NRPN_LSB: u8 = 0x62; // 98
    pub const DATA_ENTRY_MSB: u8 = 0x06; // 6
    pub const DATA_ENTRY_LSB: u8 = 0x26; // 38
}

/// MIDI message types handled by the console protocols
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },

    /// System Exclusive payload, without the F0/F7 framing
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    ///
    /// Note On with velocity 0 is kept as Note On: consoles such as the Qu
    /// use the raw velocity as the mute value.
    pub fn parse(data: &[u8]) -> Result<Self, MixerError> {
        let Some(&status) = data.first() else {
            return Err(MixerError::ProtocolDecode("empty MIDI message".into()));
        };

        let need = |n: usize| -> Result<(), MixerError> {
            if data.len() < n {
                Err(MixerError::ProtocolDecode(format!(
                    "truncated MIDI message: {}",
                    format_hex(data)
                )))
            } else {
                Ok(())
            }
        };

        if status < 0x80 {
            // Running status is not used by any supported console
            return Err(MixerError::ProtocolDecode(format!(
                "running status not supported: {}",
                format_hex(data)
            )));
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => {
                need(3)?;
                Ok(MidiMessage::NoteOff {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0x90 => {
                need(3)?;
                Ok(MidiMessage::NoteOn {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0xB0 => {
                need(3)?;
                Ok(MidiMessage::ControlChange {
                    channel,
                    cc: data[1] & 0x7F,
                    value: data[2] & 0x7F,
                })
            }
            0xC0 => {
                need(2)?;
                Ok(MidiMessage::ProgramChange {
                    channel,
                    program: data[1] & 0x7F,
                })
            }
            0xE0 => {
                need(3)?;
                let lsb = (data[1] & 0x7F) as u16;
                let msb = (data[2] & 0x7F) as u16;
                Ok(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ if status == 0xF0 => match data.iter().position(|&b| b == 0xF7) {
                Some(end) => Ok(MidiMessage::SysEx {
                    data: data[1..end].to_vec(),
                }),
                None => Err(MixerError::ProtocolDecode(format!(
                    "unterminated SysEx ({} bytes)",
                    data.len()
                ))),
            },
            _ => Err(MixerError::ProtocolDecode(format!(
                "unsupported MIDI status {:02X}",
                status
            ))),
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | (channel & 0x0F), lsb, msb]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend_from_slice(data);
                result.push(0xF7);
                result
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
            MidiMessage::SysEx { ref data } => {
                write!(f, "SysEx {} bytes", data.len())
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// List available MIDI input and output port names
pub fn list_ports() -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let midi_in = midir::MidiInput::new("Mixer-GW-Scanner")?;
    let midi_out = midir::MidiOutput::new("Mixer-GW-Scanner")?;

    let inputs = midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();
    let outputs = midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();

    Ok((inputs, outputs))
}
