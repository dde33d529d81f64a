//! Allen & Heath Qu-24 and GLD-80 over MIDI
//!
//! Faders and pans are NRPN writes on the console's MIDI channel: parameter
//! MSB is the strip address, parameter LSB selects the control (0x17 fader,
//! 0x16 pan), data MSB is the value and data LSB is always 0x07. Mutes are
//! Note On messages keyed by strip address. Scenes are recalled with a bank
//! select (CC 0) followed by a Program Change.

use super::{unsupported, ConsoleModel, Decoded};
use crate::error::{MixerError, Result};
use crate::midi::nrpn::Nrpn;
use crate::midi::MidiMessage;
use crate::protocol::WireMessage;
use crate::translate::Translator;
use crate::types::{ChannelId, ChannelKind, DeviceCapabilities, Parameter};

const PARAM_FADER: u8 = 0x17;
const PARAM_PAN: u8 = 0x16;
const DATA_LSB: u8 = 0x07;

const MUTE_ON_VELOCITY: u16 = 0x7F;
const MUTE_OFF_VELOCITY: u16 = 0x01;

/// Strip address blocks
const FX_SEND_BASE: u8 = 0x00;
const FX_RETURN_BASE: u8 = 0x08;
const INPUT_BASE: u8 = 0x20;
const AUX_BASE: u8 = 0x60;
const MAIN_ADDRESS: u8 = 0x67;

/// Fader value 0x6B is 0 dB; above that 0.5 dB per step up to +10 dB,
/// below it 0.7 dB per step down towards -inf at 0.
const FADER_UNITY: u16 = 0x6B;

fn fader_raw_to_db(raw: u16) -> f64 {
    if raw >= FADER_UNITY {
        (raw - FADER_UNITY) as f64 * 0.5
    } else {
        (raw as f64 - FADER_UNITY as f64) * 0.7
    }
}

/// Supported desks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllenHeathVariant {
    Qu24,
    Gld80,
}

impl AllenHeathVariant {
    fn model_name(&self) -> &'static str {
        match self {
            AllenHeathVariant::Qu24 => "Qu-24",
            AllenHeathVariant::Gld80 => "GLD-80",
        }
    }

    /// Product byte in the SysEx header
    fn sysex_product(&self) -> u8 {
        match self {
            AllenHeathVariant::Qu24 => 0x11,
            AllenHeathVariant::Gld80 => 0x10,
        }
    }

    fn capabilities(&self) -> DeviceCapabilities {
        match self {
            AllenHeathVariant::Qu24 => DeviceCapabilities {
                input_channels: 24,
                aux_channels: 7,
                fx_returns: 4,
                fx_sends: 4,
                scenes: 100,
                supports_meters: false,
                supports_full_state: true,
                supports_names: false,
                supports_colors: false,
            },
            AllenHeathVariant::Gld80 => DeviceCapabilities {
                input_channels: 48,
                aux_channels: 7,
                fx_returns: 8,
                fx_sends: 8,
                scenes: 500,
                supports_meters: false,
                supports_full_state: true,
                supports_names: false,
                supports_colors: false,
            },
        }
    }
}

pub struct AllenHeathModel {
    variant: AllenHeathVariant,
    midi_channel: u8,
    capabilities: DeviceCapabilities,
    fader: Translator,
    mute: Translator,
    pan: Translator,
}

impl AllenHeathModel {
    pub fn new(variant: AllenHeathVariant, midi_channel: u8) -> Self {
        Self {
            variant,
            midi_channel: midi_channel & 0x0F,
            capabilities: variant.capabilities(),
            fader: Translator::db_taper(127, fader_raw_to_db),
            mute: Translator::toggle(MUTE_ON_VELOCITY, MUTE_OFF_VELOCITY),
            pan: Translator::pan(0x4A, 0x25),
        }
    }

    pub fn qu24(midi_channel: u8) -> Self {
        Self::new(AllenHeathVariant::Qu24, midi_channel)
    }

    pub fn gld80(midi_channel: u8) -> Self {
        Self::new(AllenHeathVariant::Gld80, midi_channel)
    }

    fn address_for(&self, channel: &ChannelId) -> Option<u8> {
        if !self.capabilities.contains(channel) {
            return None;
        }
        let offset = channel.index.saturating_sub(1) as u8;
        Some(match channel.kind {
            ChannelKind::Input => INPUT_BASE + offset,
            ChannelKind::Aux => AUX_BASE + offset,
            ChannelKind::FxReturn => FX_RETURN_BASE + offset,
            ChannelKind::FxSend => FX_SEND_BASE + offset,
            ChannelKind::Main => MAIN_ADDRESS,
        })
    }

    fn channel_for(&self, address: u8) -> Option<ChannelId> {
        let id = match address {
            MAIN_ADDRESS => ChannelId::MAIN,
            a if a >= AUX_BASE => ChannelId::aux((a - AUX_BASE) as u16 + 1),
            a if a >= INPUT_BASE => ChannelId::input((a - INPUT_BASE) as u16 + 1),
            a if a >= FX_RETURN_BASE => ChannelId::fx_return((a - FX_RETURN_BASE) as u16 + 1),
            a => ChannelId::fx_send((a - FX_SEND_BASE) as u16 + 1),
        };
        self.capabilities.contains(&id).then_some(id)
    }

    /// `F0 00 00 1A 50 <product> 01 00` without the framing bytes
    fn sysex_prefix(&self) -> Vec<u8> {
        vec![0x00, 0x00, 0x1A, 0x50, self.variant.sysex_product(), 0x01, 0x00]
    }
}

impl ConsoleModel for AllenHeathModel {
    fn manufacturer(&self) -> &str {
        "Allen & Heath"
    }

    fn model(&self) -> &str {
        self.variant.model_name()
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
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
        let address = self
            .address_for(channel)
            .ok_or_else(|| MixerError::InvalidChannel(channel.to_string()))?;
        let value = raw.min(127) as u8;
        let message = match parameter {
            Parameter::Mute => WireMessage::Midi(MidiMessage::NoteOn {
                channel: self.midi_channel,
                note: address,
                velocity: value,
            }),
            Parameter::Fader | Parameter::Pan => WireMessage::Nrpn(Nrpn {
                channel: self.midi_channel,
                param_msb: address,
                param_lsb: if parameter == Parameter::Fader { PARAM_FADER } else { PARAM_PAN },
                value_msb: value,
                value_lsb: DATA_LSB,
            }),
            Parameter::Name | Parameter::Color => return Err(unsupported(self.model(), parameter)),
        };
        Ok(vec![message])
    }

    fn decode(&self, message: &WireMessage) -> Result<Option<Decoded>> {
        let decoded = match *message {
            WireMessage::Nrpn(n) if n.channel == self.midi_channel => {
                let parameter = match n.param_lsb {
                    PARAM_FADER => Parameter::Fader,
                    PARAM_PAN => Parameter::Pan,
                    _ => return Ok(None),
                };
                self.channel_for(n.param_msb).map(|channel| Decoded::Param {
                    channel,
                    parameter,
                    raw: n.value_msb as u16,
                })
            }
            // Velocity 0 is the note-off that follows every mute report
            WireMessage::Midi(MidiMessage::NoteOn { channel, note, velocity })
                if channel == self.midi_channel && velocity > 0 =>
            {
                self.channel_for(note).map(|channel| Decoded::Param {
                    channel,
                    parameter: Parameter::Mute,
                    raw: velocity as u16,
                })
            }
            _ => None,
        };
        Ok(decoded)
    }

    /// SysEx "get system state" addressed to all channels
    fn full_state_request(&self) -> Vec<WireMessage> {
        let mut data = self.sysex_prefix();
        data.extend_from_slice(&[0x7F, 0x10, 0x00]);
        vec![WireMessage::Midi(MidiMessage::SysEx { data })]
    }

    /// Bank `(scene - 1) / 128`, program `(scene - 1) % 128`
    fn scene_recall(&self, scene: u16) -> Vec<WireMessage> {
        let index = scene.saturating_sub(1);
        vec![
            WireMessage::Midi(MidiMessage::ControlChange {
                channel: self.midi_channel,
                cc: 0x00,
                value: ((index / 128) & 0x7F) as u8,
            }),
            WireMessage::Midi(MidiMessage::ProgramChange {
                channel: self.midi_channel,
                program: (index % 128) as u8,
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;

    #[test]
    fn test_fader_is_nrpn_with_data_lsb_7() {
        let m = AllenHeathModel::qu24(0);
        let raw = m.translator(Parameter::Fader).unwrap().to_hardware(ParamValue::Level(0.75)).unwrap();
        assert_eq!(raw, 0x6B);
        let msgs = m.encode(&ChannelId::input(1), Parameter::Fader, raw).unwrap();
        assert_eq!(
            msgs,
            vec![WireMessage::Nrpn(Nrpn {
                channel: 0,
                param_msb: 0x20,
                param_lsb: 0x17,
                value_msb: 0x6B,
                value_lsb: 0x07,
            })]
        );
    }

    #[test]
    fn test_strip_addresses() {
        let m = AllenHeathModel::qu24(0);
        let cases = [
            (ChannelId::input(24), 0x37),
            (ChannelId::aux(1), 0x60),
            (ChannelId::aux(7), 0x66),
            (ChannelId::fx_return(1), 0x08),
            (ChannelId::fx_send(4), 0x03),
            (ChannelId::MAIN, 0x67),
        ];
        for (id, address) in cases {
            assert_eq!(m.address_for(&id), Some(address), "{id}");
            assert_eq!(m.channel_for(address), Some(id));
        }
        assert_eq!(m.address_for(&ChannelId::input(25)), None);
        assert_eq!(m.channel_for(0x38), None);
    }

    #[test]
    fn test_mute_note_on_velocities() {
        let m = AllenHeathModel::qu24(2);
        let mute = m.translator(Parameter::Mute).unwrap();
        let on = mute.to_hardware(ParamValue::Toggle(true)).unwrap();
        let off = mute.to_hardware(ParamValue::Toggle(false)).unwrap();
        assert_eq!(
            m.encode(&ChannelId::input(2), Parameter::Mute, on).unwrap(),
            vec![WireMessage::Midi(MidiMessage::NoteOn { channel: 2, note: 0x21, velocity: 0x7F })]
        );
        assert_eq!(off, 0x01);

        let report = WireMessage::Midi(MidiMessage::NoteOn { channel: 2, note: 0x21, velocity: 0x3F });
        let Some(Decoded::Param { raw, parameter, .. }) = m.decode(&report).unwrap() else {
            panic!("expected mute");
        };
        assert_eq!(parameter, Parameter::Mute);
        assert_eq!(mute.from_hardware(raw).unwrap(), ParamValue::Toggle(false));

        let note_off = WireMessage::Midi(MidiMessage::NoteOn { channel: 2, note: 0x21, velocity: 0 });
        assert!(m.decode(&note_off).unwrap().is_none());
    }

    #[test]
    fn test_decode_ignores_other_channels_and_params() {
        let m = AllenHeathModel::qu24(0);
        let other_channel = Nrpn { channel: 5, param_msb: 0x20, param_lsb: 0x17, value_msb: 1, value_lsb: 7 };
        assert!(m.decode(&WireMessage::Nrpn(other_channel)).unwrap().is_none());
        let compressor = Nrpn { channel: 0, param_msb: 0x20, param_lsb: 0x61, value_msb: 1, value_lsb: 7 };
        assert!(m.decode(&WireMessage::Nrpn(compressor)).unwrap().is_none());
        let pan = Nrpn { channel: 0, param_msb: 0x67, param_lsb: 0x16, value_msb: 0x25, value_lsb: 7 };
        assert_eq!(
            m.decode(&WireMessage::Nrpn(pan)).unwrap(),
            Some(Decoded::Param { channel: ChannelId::MAIN, parameter: Parameter::Pan, raw: 0x25 })
        );
    }

    #[test]
    fn test_full_state_sysex() {
        let qu = AllenHeathModel::qu24(0);
        let requests = qu.full_state_request();
        let [WireMessage::Midi(msg)] = requests.as_slice() else {
            panic!("expected one MIDI message");
        };
        assert_eq!(
            msg.encode(),
            vec![0xF0, 0x00, 0x00, 0x1A, 0x50, 0x11, 0x01, 0x00, 0x7F, 0x10, 0x00, 0xF7]
        );

        let gld = AllenHeathModel::gld80(0);
        assert_eq!(gld.model(), "GLD-80");
        assert_eq!(gld.capabilities().input_channels, 48);
        let requests = gld.full_state_request();
        assert!(matches!(&requests[0], WireMessage::Midi(MidiMessage::SysEx { data }) if data[4] == 0x10));
    }

    #[test]
    fn test_scene_recall_bank_and_program() {
        let qu = AllenHeathModel::qu24(1);
        assert_eq!(
            qu.scene_recall(1),
            vec![
                WireMessage::Midi(MidiMessage::ControlChange { channel: 1, cc: 0, value: 0 }),
                WireMessage::Midi(MidiMessage::ProgramChange { channel: 1, program: 0 }),
            ]
        );
        let gld = AllenHeathModel::gld80(0);
        assert_eq!(
            gld.scene_recall(300),
            vec![
                WireMessage::Midi(MidiMessage::ControlChange { channel: 0, cc: 0, value: 2 }),
                WireMessage::Midi(MidiMessage::ProgramChange { channel: 0, program: 43 }),
            ]
        );
    }

    #[test]
    fn test_labels_are_unsupported() {
        let m = AllenHeathModel::gld80(0);
        assert!(matches!(
            m.encode(&ChannelId::input(1), Parameter::Color, 3),
            Err(MixerError::Unsupported(_))
        ));
        assert!(!m.capabilities().supports(Parameter::Name));
    }

    #[test]
    fn test_pan_center_is_0x25() {
        let m = AllenHeathModel::qu24(0);
        let pan = m.translator(Parameter::Pan).unwrap();
        assert_eq!(pan.to_hardware(ParamValue::Level(0.0)).unwrap(), 0x25);
        assert_eq!(pan.to_hardware(ParamValue::Level(-1.0)).unwrap(), 0x00);
        assert_eq!(pan.to_hardware(ParamValue::Level(1.0)).unwrap(), 0x4A);
    }
}
