//! Behringer X Air series (XR12/XR16/XR18, MR18)
//!
//! Two wire formats: plain MIDI CC, where the console exposes fader, mute and
//! pan on three consecutive MIDI channels, and OSC over UDP on port 10024.

use rosc::{OscMessage, OscType};
use std::collections::HashMap;
use std::time::Duration;

use super::{unsupported, ConsoleModel, Decoded};
use crate::error::{MixerError, Result};
use crate::midi::MidiMessage;
use crate::protocol::WireMessage;
use crate::translate::Translator;
use crate::types::{ChannelId, ChannelKind, DeviceCapabilities, ParamValue, Parameter, COLOR_COUNT};

const MANUFACTURER: &str = "Behringer";

/// Snapshots 1-64
const SCENES: u16 = 64;

/// The OSC surface reports and queries everything; MIDI CC only moves the mix
fn xair_capabilities(osc: bool) -> DeviceCapabilities {
    DeviceCapabilities {
        input_channels: 16,
        aux_channels: 6,
        fx_returns: 4,
        fx_sends: 4,
        scenes: SCENES,
        supports_meters: osc,
        supports_full_state: osc,
        supports_names: osc,
        supports_colors: osc,
    }
}

// ---------------------------------------------------------------------------
// MIDI CC
// ---------------------------------------------------------------------------

/// CC numbers for each strip; CC16 is the aux line-in, which we do not model
mod cc {
    pub const FX_RETURN_BASE: u8 = 16; // fx_1 = CC17
    pub const AUX_BASE: u8 = 20; // aux_1 = CC21
    pub const FX_SEND_BASE: u8 = 26; // fxsend_1 = CC27
    pub const MAIN: u8 = 31;
}

/// X Air over MIDI Control Change
///
/// Fader on the base MIDI channel, mute on base+1, pan on base+2. No full-state
/// query exists in this mode; state is learned as the console reports changes.
pub struct XAirMidiModel {
    base_channel: u8,
    fader: Translator,
    mute: Translator,
    pan: Translator,
}

impl XAirMidiModel {
    pub fn new(base_channel: u8) -> Self {
        Self {
            // Three channels starting here must fit in 0-15
            base_channel: base_channel.min(13),
            fader: Translator::linear(127),
            mute: Translator::toggle(127, 0),
            pan: Translator::pan(127, 64),
        }
    }

    fn cc_for(&self, channel: &ChannelId) -> Option<u8> {
        let caps = self.capabilities();
        if !caps.contains(channel) {
            return None;
        }
        let n = channel.index as u8;
        Some(match channel.kind {
            ChannelKind::Input => n - 1,
            ChannelKind::FxReturn => cc::FX_RETURN_BASE + n,
            ChannelKind::Aux => cc::AUX_BASE + n,
            ChannelKind::FxSend => cc::FX_SEND_BASE + n,
            ChannelKind::Main => cc::MAIN,
        })
    }

    fn channel_for(cc_number: u8) -> Option<ChannelId> {
        match cc_number {
            0..=15 => Some(ChannelId::input(cc_number as u16 + 1)),
            17..=20 => Some(ChannelId::fx_return((cc_number - cc::FX_RETURN_BASE) as u16)),
            21..=26 => Some(ChannelId::aux((cc_number - cc::AUX_BASE) as u16)),
            27..=30 => Some(ChannelId::fx_send((cc_number - cc::FX_SEND_BASE) as u16)),
            cc::MAIN => Some(ChannelId::MAIN),
            _ => None,
        }
    }

    fn midi_channel_for(&self, parameter: Parameter) -> Option<u8> {
        let offset = match parameter {
            Parameter::Fader => 0,
            Parameter::Mute => 1,
            Parameter::Pan => 2,
            Parameter::Name | Parameter::Color => return None,
        };
        Some(self.base_channel + offset)
    }
}

impl Default for XAirMidiModel {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConsoleModel for XAirMidiModel {
    fn manufacturer(&self) -> &str {
        MANUFACTURER
    }

    fn model(&self) -> &str {
        "X Air (MIDI)"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        xair_capabilities(false)
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
        let cc = self
            .cc_for(channel)
            .ok_or_else(|| MixerError::InvalidChannel(channel.to_string()))?;
        let midi_channel = self
            .midi_channel_for(parameter)
            .ok_or_else(|| unsupported(self.model(), parameter))?;
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
        let parameter = match channel.wrapping_sub(self.base_channel) {
            0 => Parameter::Fader,
            1 => Parameter::Mute,
            2 => Parameter::Pan,
            _ => return Ok(None),
        };
        Ok(Self::channel_for(cc).map(|channel| Decoded::Param {
            channel,
            parameter,
            raw: value as u16,
        }))
    }

    /// Program Change on the base channel selects snapshot `program + 1`
    fn scene_recall(&self, scene: u16) -> Vec<WireMessage> {
        vec![WireMessage::Midi(MidiMessage::ProgramChange {
            channel: self.base_channel,
            program: (scene.saturating_sub(1) & 0x7F) as u8,
        })]
    }
}

// ---------------------------------------------------------------------------
// OSC
// ---------------------------------------------------------------------------

/// Raw resolution of OSC faders (the console's 1024-step fader)
const OSC_FADER_STEPS: u16 = 1023;
/// Pan is a float in [0,1] with 0.5 at center; 100 steps like the console UI
const OSC_PAN_STEPS: u16 = 100;
/// Meter subscriptions and `/xremote` expire after 10 seconds
const OSC_KEEPALIVE: Duration = Duration::from_secs(8);
const METERS_INPUTS: &str = "/meters/1";
/// Lowest level shown on a meter
const METER_FLOOR_DB: f64 = -60.0;
/// Scribble-strip colors 8-15 are the inverted versions of 0-7
const OSC_COLOR_MAX: i32 = 15;

/// X Air over OSC
pub struct XAirOscModel {
    fader: Translator,
    mute: Translator,
    pan: Translator,
}

impl XAirOscModel {
    pub fn new() -> Self {
        Self {
            fader: Translator::linear(OSC_FADER_STEPS),
            // `/mix/on` is 1 when the channel plays, so muted is 0
            mute: Translator::toggle(0, 1),
            pan: Translator::pan(OSC_PAN_STEPS, OSC_PAN_STEPS / 2),
        }
    }

    fn strip_prefix(channel: &ChannelId) -> String {
        match channel.kind {
            ChannelKind::Input => format!("/ch/{:02}", channel.index),
            ChannelKind::Aux => format!("/bus/{}", channel.index),
            ChannelKind::FxReturn => format!("/rtn/{}", channel.index),
            ChannelKind::FxSend => format!("/fxsend/{}", channel.index),
            ChannelKind::Main => "/lr".to_string(),
        }
    }

    fn leaf(parameter: Parameter) -> &'static str {
        match parameter {
            Parameter::Fader => "mix/fader",
            Parameter::Mute => "mix/on",
            Parameter::Pan => "mix/pan",
            Parameter::Name => "config/name",
            Parameter::Color => "config/color",
        }
    }

    fn address(channel: &ChannelId, parameter: Parameter) -> String {
        format!("{}/{}", Self::strip_prefix(channel), Self::leaf(parameter))
    }

    /// Parse `/ch/01/mix/fader`, `/bus/2/config/name` and friends
    fn parse_address(&self, addr: &str) -> Option<(ChannelId, Parameter)> {
        let parts: Vec<&str> = addr.trim_start_matches('/').split('/').collect();
        let (channel, section, leaf) = match parts.as_slice() {
            ["lr", section, leaf] => (ChannelId::MAIN, *section, *leaf),
            [strip, n, section, leaf] => {
                let index: u16 = n.parse().ok()?;
                let kind = match *strip {
                    "ch" => ChannelKind::Input,
                    "bus" => ChannelKind::Aux,
                    "rtn" => ChannelKind::FxReturn,
                    "fxsend" => ChannelKind::FxSend,
                    _ => return None,
                };
                (ChannelId::new(kind, index), *section, *leaf)
            }
            _ => return None,
        };
        let parameter = match (section, leaf) {
            ("mix", "fader") => Parameter::Fader,
            ("mix", "on") => Parameter::Mute,
            ("mix", "pan") => Parameter::Pan,
            ("config", "name") => Parameter::Name,
            ("config", "color") => Parameter::Color,
            _ => return None,
        };
        self.capabilities().contains(&channel).then_some((channel, parameter))
    }

    fn label_value(msg: &OscMessage, parameter: Parameter) -> Result<ParamValue> {
        match (parameter, msg.args.first()) {
            (Parameter::Name, Some(OscType::String(name))) => Ok(ParamValue::Text(name.clone())),
            (Parameter::Color, Some(OscType::Int(c))) if (0..=OSC_COLOR_MAX).contains(c) => {
                Ok(ParamValue::Color(*c as u8 % COLOR_COUNT))
            }
            (_, other) => Err(MixerError::ProtocolDecode(format!(
                "{}: unexpected argument {:?}",
                msg.addr, other
            ))),
        }
    }

    /// Float argument scaled to `steps`, or an integer argument in `0..=steps`
    fn raw_arg(msg: &OscMessage, steps: u16) -> Result<u16> {
        match msg.args.first() {
            Some(OscType::Float(f)) if f.is_finite() => Ok((f.clamp(0.0, 1.0) as f64 * steps as f64).round() as u16),
            Some(OscType::Double(f)) if f.is_finite() => Ok((f.clamp(0.0, 1.0) * steps as f64).round() as u16),
            Some(OscType::Int(i)) => u16::try_from(*i)
                .ok()
                .filter(|raw| *raw <= steps)
                .ok_or_else(|| {
                    MixerError::ProtocolDecode(format!("{}: value {} outside 0..={}", msg.addr, i, steps))
                }),
            other => Err(MixerError::ProtocolDecode(format!(
                "{}: unexpected argument {:?}",
                msg.addr, other
            ))),
        }
    }

    /// `/meters/1`: int32 LE value count followed by i16 LE values in 1/256 dB
    ///
    /// Order: 16 inputs, aux line-in L/R, 4 stereo FX returns, 6 buses,
    /// 4 FX sends, main L/R, monitor L/R.
    fn decode_meters(msg: &OscMessage) -> Result<HashMap<ChannelId, f64>> {
        let Some(OscType::Blob(blob)) = msg.args.first() else {
            return Err(MixerError::ProtocolDecode(format!("{}: missing meter blob", msg.addr)));
        };
        if blob.len() < 4 {
            return Err(MixerError::ProtocolDecode("meter blob too short".into()));
        }
        let count = i32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]).max(0) as usize;
        let values: Vec<f64> = blob[4..]
            .chunks_exact(2)
            .take(count)
            .map(|b| {
                let db = i16::from_le_bytes([b[0], b[1]]) as f64 / 256.0;
                ((db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0)
            })
            .collect();
        if values.len() < 36 {
            return Err(MixerError::ProtocolDecode(format!(
                "meter blob holds {} values, expected at least 36",
                values.len()
            )));
        }

        let mut levels = HashMap::new();
        for i in 0..16 {
            levels.insert(ChannelId::input(i as u16 + 1), values[i]);
        }
        for i in 0..4 {
            let (l, r) = (values[18 + 2 * i], values[19 + 2 * i]);
            levels.insert(ChannelId::fx_return(i as u16 + 1), l.max(r));
        }
        for i in 0..6 {
            levels.insert(ChannelId::aux(i as u16 + 1), values[26 + i]);
        }
        for i in 0..4 {
            levels.insert(ChannelId::fx_send(i as u16 + 1), values[32 + i]);
        }
        if let (Some(l), Some(r)) = (values.get(36), values.get(37)) {
            levels.insert(ChannelId::MAIN, l.max(*r));
        }
        Ok(levels)
    }
}

impl Default for XAirOscModel {
    fn default() -> Self {
        Self::new()
    }
}

fn osc(addr: impl Into<String>, args: Vec<OscType>) -> WireMessage {
    WireMessage::Osc(OscMessage {
        addr: addr.into(),
        args,
    })
}

impl ConsoleModel for XAirOscModel {
    fn manufacturer(&self) -> &str {
        MANUFACTURER
    }

    fn model(&self) -> &str {
        "X Air (OSC)"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        xair_capabilities(true)
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
        if !self.capabilities().contains(channel) {
            return Err(MixerError::InvalidChannel(channel.to_string()));
        }
        let arg = match parameter {
            Parameter::Fader => OscType::Float(raw as f32 / OSC_FADER_STEPS as f32),
            Parameter::Pan => OscType::Float(raw as f32 / OSC_PAN_STEPS as f32),
            Parameter::Mute => OscType::Int(raw as i32),
            Parameter::Name | Parameter::Color => return Err(unsupported(self.model(), parameter)),
        };
        Ok(vec![osc(Self::address(channel, parameter), vec![arg])])
    }

    fn encode_label(&self, channel: &ChannelId, parameter: Parameter, value: &ParamValue) -> Result<Vec<WireMessage>> {
        if !self.capabilities().contains(channel) {
            return Err(MixerError::InvalidChannel(channel.to_string()));
        }
        let arg = match (parameter, value) {
            (Parameter::Name, ParamValue::Text(name)) => OscType::String(name.clone()),
            (Parameter::Color, ParamValue::Color(c)) => OscType::Int(*c as i32),
            _ => {
                return Err(MixerError::Translation(format!(
                    "{} cannot carry {}",
                    parameter, value
                )))
            }
        };
        Ok(vec![osc(Self::address(channel, parameter), vec![arg])])
    }

    fn decode(&self, message: &WireMessage) -> Result<Option<Decoded>> {
        let WireMessage::Osc(msg) = message else {
            return Ok(None);
        };
        if msg.addr == METERS_INPUTS {
            return Self::decode_meters(msg).map(|levels| Some(Decoded::Meters(levels)));
        }
        let Some((channel, parameter)) = self.parse_address(&msg.addr) else {
            return Ok(None);
        };
        let raw = match parameter {
            Parameter::Fader => Self::raw_arg(msg, OSC_FADER_STEPS)?,
            Parameter::Pan => Self::raw_arg(msg, OSC_PAN_STEPS)?,
            Parameter::Mute => Self::raw_arg(msg, 1)?,
            Parameter::Name | Parameter::Color => {
                let value = Self::label_value(msg, parameter)?;
                return Ok(Some(Decoded::Label { channel, parameter, value }));
            }
        };
        Ok(Some(Decoded::Param { channel, parameter, raw }))
    }

    /// An OSC query is the address without arguments
    fn full_state_request(&self) -> Vec<WireMessage> {
        let caps = self.capabilities();
        caps.channel_ids()
            .iter()
            .flat_map(|id| {
                Parameter::MIX
                    .into_iter()
                    .chain([Parameter::Name, Parameter::Color])
                    .map(move |p| osc(Self::address(id, p), Vec::new()))
            })
            .collect()
    }

    fn scene_recall(&self, scene: u16) -> Vec<WireMessage> {
        vec![osc("/-snap/load", vec![OscType::Int(scene as i32)])]
    }

    fn keepalive(&self) -> Option<(Duration, Vec<WireMessage>)> {
        Some((
            OSC_KEEPALIVE,
            vec![
                osc("/xremote", Vec::new()),
                osc("/meters", vec![OscType::String(METERS_INPUTS.to_string())]),
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;

    fn cc(channel: u8, cc: u8, value: u8) -> WireMessage {
        WireMessage::Midi(MidiMessage::ControlChange { channel, cc, value })
    }

    #[test]
    fn test_midi_channel_map() {
        let m = XAirMidiModel::default();
        let cases = [
            (ChannelId::input(1), 0),
            (ChannelId::input(16), 15),
            (ChannelId::fx_return(1), 17),
            (ChannelId::aux(1), 21),
            (ChannelId::aux(6), 26),
            (ChannelId::fx_send(4), 30),
            (ChannelId::MAIN, 31),
        ];
        for (id, expected) in cases {
            assert_eq!(m.encode(&id, Parameter::Fader, 64).unwrap(), vec![cc(0, expected, 64)], "{id}");
            assert_eq!(
                m.decode(&cc(0, expected, 64)).unwrap(),
                Some(Decoded::Param { channel: id, parameter: Parameter::Fader, raw: 64 })
            );
        }
    }

    #[test]
    fn test_midi_parameters_use_separate_channels() {
        let m = XAirMidiModel::default();
        assert_eq!(m.encode(&ChannelId::input(3), Parameter::Mute, 127).unwrap(), vec![cc(1, 2, 127)]);
        assert_eq!(m.encode(&ChannelId::input(3), Parameter::Pan, 64).unwrap(), vec![cc(2, 2, 64)]);
        assert!(m.decode(&cc(5, 2, 64)).unwrap().is_none());
        // CC16 is the aux line-in
        assert!(m.decode(&cc(0, 16, 64)).unwrap().is_none());
    }

    #[test]
    fn test_midi_invalid_channel() {
        let m = XAirMidiModel::default();
        for id in [ChannelId::input(17), ChannelId::aux(7), ChannelId::fx_return(5)] {
            assert_eq!(
                m.encode(&id, Parameter::Fader, 10),
                Err(MixerError::InvalidChannel(id.to_string()))
            );
        }
    }

    #[test]
    fn test_midi_has_no_labels_and_recalls_by_program_change() {
        let m = XAirMidiModel::new(2);
        assert!(m.translator(Parameter::Name).is_none());
        assert!(matches!(
            m.encode_label(&ChannelId::input(1), Parameter::Name, &ParamValue::Text("Vox".into())),
            Err(MixerError::Unsupported(_))
        ));
        assert!(!m.capabilities().supports(Parameter::Color));
        assert_eq!(
            m.scene_recall(12),
            vec![WireMessage::Midi(MidiMessage::ProgramChange { channel: 2, program: 11 })]
        );
    }

    #[test]
    fn test_midi_mute_threshold() {
        let m = XAirMidiModel::default();
        let mute = m.translator(Parameter::Mute).unwrap();
        assert_eq!(mute.from_hardware(64).unwrap(), ParamValue::Toggle(true));
        assert_eq!(mute.from_hardware(63).unwrap(), ParamValue::Toggle(false));
    }

    #[test]
    fn test_osc_addresses() {
        let m = XAirOscModel::new();
        assert_eq!(
            m.encode(&ChannelId::input(1), Parameter::Fader, 1023).unwrap(),
            vec![osc("/ch/01/mix/fader", vec![OscType::Float(1.0)])]
        );
        assert_eq!(
            m.encode(&ChannelId::MAIN, Parameter::Mute, 0).unwrap(),
            vec![osc("/lr/mix/on", vec![OscType::Int(0)])]
        );

        assert_eq!(XAirOscModel::address(&ChannelId::aux(2), Parameter::Pan), "/bus/2/mix/pan");
        assert_eq!(XAirOscModel::address(&ChannelId::fx_return(3), Parameter::Fader), "/rtn/3/mix/fader");
        assert_eq!(XAirOscModel::address(&ChannelId::fx_send(4), Parameter::Mute), "/fxsend/4/mix/on");
    }

    #[test]
    fn test_osc_decode() {
        let m = XAirOscModel::new();
        let fader = osc("/ch/05/mix/fader", vec![OscType::Float(0.5)]);
        assert_eq!(
            m.decode(&fader).unwrap(),
            Some(Decoded::Param { channel: ChannelId::input(5), parameter: Parameter::Fader, raw: 512 })
        );

        // on=0 means muted
        let on = osc("/bus/1/mix/on", vec![OscType::Int(0)]);
        let Some(Decoded::Param { raw, .. }) = m.decode(&on).unwrap() else {
            panic!("expected param");
        };
        assert_eq!(m.translator(Parameter::Mute).unwrap().from_hardware(raw).unwrap(), ParamValue::Toggle(true));

        assert!(m.decode(&osc("/ch/17/mix/fader", vec![OscType::Float(0.5)])).unwrap().is_none());
        assert!(m.decode(&osc("/ch/01/eq/1/g", vec![OscType::Float(0.5)])).unwrap().is_none());
        assert!(matches!(
            m.decode(&osc("/ch/01/mix/fader", vec![OscType::String("x".into())])),
            Err(MixerError::ProtocolDecode(_))
        ));
    }

    #[test]
    fn test_osc_int_outside_range_is_rejected() {
        let m = XAirOscModel::new();
        // 65536 must not wrap to 0 (muted)
        for bad in [65536, -1, 2] {
            assert!(
                matches!(
                    m.decode(&osc("/ch/01/mix/on", vec![OscType::Int(bad)])),
                    Err(MixerError::ProtocolDecode(_))
                ),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            m.decode(&osc("/ch/01/mix/fader", vec![OscType::Int(1024)])),
            Err(MixerError::ProtocolDecode(_))
        ));
        assert_eq!(
            m.decode(&osc("/ch/01/mix/on", vec![OscType::Int(1)])).unwrap(),
            Some(Decoded::Param { channel: ChannelId::input(1), parameter: Parameter::Mute, raw: 1 })
        );
    }

    #[test]
    fn test_osc_labels() {
        let m = XAirOscModel::new();
        assert_eq!(
            m.encode_label(&ChannelId::input(2), Parameter::Name, &ParamValue::Text("Kick".into())).unwrap(),
            vec![osc("/ch/02/config/name", vec![OscType::String("Kick".into())])]
        );
        assert_eq!(
            m.encode_label(&ChannelId::MAIN, Parameter::Color, &ParamValue::Color(4)).unwrap(),
            vec![osc("/lr/config/color", vec![OscType::Int(4)])]
        );
        assert!(matches!(
            m.encode_label(&ChannelId::aux(9), Parameter::Color, &ParamValue::Color(4)),
            Err(MixerError::InvalidChannel(_))
        ));

        assert_eq!(
            m.decode(&osc("/bus/3/config/name", vec![OscType::String("Wedge".into())])).unwrap(),
            Some(Decoded::Label {
                channel: ChannelId::aux(3),
                parameter: Parameter::Name,
                value: ParamValue::Text("Wedge".into()),
            })
        );
        // Inverted red reads back as red
        assert_eq!(
            m.decode(&osc("/rtn/1/config/color", vec![OscType::Int(9)])).unwrap(),
            Some(Decoded::Label {
                channel: ChannelId::fx_return(1),
                parameter: Parameter::Color,
                value: ParamValue::Color(1),
            })
        );
        assert!(matches!(
            m.decode(&osc("/ch/01/config/color", vec![OscType::Int(16)])),
            Err(MixerError::ProtocolDecode(_))
        ));
        assert!(m.decode(&osc("/ch/01/config/icon", vec![OscType::Int(3)])).unwrap().is_none());
    }

    #[test]
    fn test_osc_scene_recall() {
        let m = XAirOscModel::new();
        assert_eq!(m.scene_recall(5), vec![osc("/-snap/load", vec![OscType::Int(5)])]);
    }

    #[test]
    fn test_osc_full_state_queries_every_address() {
        let m = XAirOscModel::new();
        let queries = m.full_state_request();
        assert_eq!(queries.len(), (16 + 6 + 4 + 4 + 1) * 5);
        assert!(queries.iter().all(|q| matches!(q, WireMessage::Osc(msg) if msg.args.is_empty())));
    }

    #[test]
    fn test_osc_meters() {
        let mut blob = 40i32.to_le_bytes().to_vec();
        for i in 0..40i16 {
            // input 1 at 0 dB, everything else at -30 dB
            let db: i16 = if i == 0 { 0 } else { -30 * 256 };
            blob.extend_from_slice(&db.to_le_bytes());
        }
        let m = XAirOscModel::new();
        let Some(Decoded::Meters(levels)) = m.decode(&osc("/meters/1", vec![OscType::Blob(blob)])).unwrap() else {
            panic!("expected meters");
        };
        assert_eq!(levels[&ChannelId::input(1)], 1.0);
        assert_eq!(levels[&ChannelId::input(2)], 0.5);
        assert!(levels.contains_key(&ChannelId::MAIN));
        assert_eq!(levels.len(), 16 + 4 + 6 + 4 + 1);

        let short = osc("/meters/1", vec![OscType::Blob(vec![1, 0])]);
        assert!(matches!(m.decode(&short), Err(MixerError::ProtocolDecode(_))));
    }
}
