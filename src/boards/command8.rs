//! Focusrite Command8 control surface
//!
//! One strip per MIDI channel: CC 7 is the fader, CC 10 the pan and CC 14 the
//! mute (127 muted, 0 open). The surface has no master strip on the wire, no
//! scene memory and no way to read its state back.

use super::{ConsoleModel, Decoded};
use crate::error::{MixerError, Result};
use crate::midi::MidiMessage;
use crate::protocol::WireMessage;
use crate::translate::Translator;
use crate::types::{ChannelId, ChannelKind, DeviceCapabilities, Parameter};

const CC_FADER: u8 = 7;
const CC_PAN: u8 = 10;
const CC_MUTE: u8 = 14;

const STRIPS: u16 = 16;

pub struct Command8Model {
    fader: Translator,
    mute: Translator,
    pan: Translator,
}

impl Command8Model {
    pub fn new() -> Self {
        Self {
            fader: Translator::linear(127),
            mute: Translator::toggle(127, 0),
            pan: Translator::pan(127, 64),
        }
    }

    fn midi_channel_for(channel: &ChannelId) -> Option<u8> {
        (channel.kind == ChannelKind::Input && (1..=STRIPS).contains(&channel.index))
            .then(|| (channel.index - 1) as u8)
    }
}

impl Default for Command8Model {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleModel for Command8Model {
    fn manufacturer(&self) -> &str {
        "Focusrite"
    }

    fn model(&self) -> &str {
        "Command8"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            input_channels: STRIPS,
            aux_channels: 0,
            fx_returns: 0,
            fx_sends: 0,
            scenes: 0,
            supports_meters: false,
            supports_full_state: false,
            supports_names: false,
            supports_colors: false,
        }
    }

    fn translator(&self, parameter: Parameter) -> Option<&Translator> {
        match parameter {
            Parameter::Fader => Some(&self.fader),
            Parameter::Mute => Some(&self.mute),
            Parameter::Pan => Some(&self.pan),
            Parameter::Name | Parameter::Color => None,
        }
    }

    fn encode(&self, channel: &ChannelId, parameter: Parameter, raw: u16) -> Result<Vec<WireMessage>> {
        let midi_channel =
            Self::midi_channel_for(channel).ok_or_else(|| MixerError::InvalidChannel(channel.to_string()))?;
        let cc = match parameter {
            Parameter::Fader => CC_FADER,
            Parameter::Pan => CC_PAN,
            Parameter::Mute => CC_MUTE,
            Parameter::Name | Parameter::Color => return Err(super::unsupported(self.model(), parameter)),
        };
        Ok(vec![WireMessage::Midi(MidiMessage::ControlChange {
            channel: midi_channel,
            cc,
            value: raw.min(127) as u8,
        })])
    }

    fn decode(&self, message: &WireMessage) -> Result<Option<Decoded>> {
        let WireMessage::Midi(MidiMessage::ControlChange { channel, cc, value }) = *message else {
            return Ok(None);
        };
        let parameter = match cc {
            CC_FADER => Parameter::Fader,
            CC_PAN => Parameter::Pan,
            CC_MUTE => Parameter::Mute,
            _ => return Ok(None),
        };
        Ok(Some(Decoded::Param {
            channel: ChannelId::input(channel as u16 + 1),
            parameter,
            raw: value as u16,
        }))
    }
}
