//! Mixer data model
//!
//! Plain structures shared by every component. Values are validated once at
//! the boundary (channel id parsing, command intake, wire decode) and trusted
//! internally afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::MixerError;

/// Kind of console strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Input,
    Aux,
    FxReturn,
    FxSend,
    Main,
}

impl ChannelKind {
    /// Id prefix used in the `{prefix}_{n}` grammar
    pub fn prefix(&self) -> &'static str {
        match self {
            ChannelKind::Input => "input",
            ChannelKind::Aux => "aux",
            ChannelKind::FxReturn => "fx",
            ChannelKind::FxSend => "fxsend",
            ChannelKind::Main => "main",
        }
    }

    fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "input" => Some(ChannelKind::Input),
            "aux" => Some(ChannelKind::Aux),
            "fx" => Some(ChannelKind::FxReturn),
            "fxsend" => Some(ChannelKind::FxSend),
            _ => None,
        }
    }

    fn display_label(&self) -> &'static str {
        match self {
            ChannelKind::Input => "Ch",
            ChannelKind::Aux => "Aux",
            ChannelKind::FxReturn => "FX",
            ChannelKind::FxSend => "FX Send",
            ChannelKind::Main => "Main",
        }
    }
}

/// Channel identifier: `input_3`, `aux_1`, `fx_2`, `fxsend_4` or `main`
///
/// Ordered by kind first, then index, so a `BTreeMap<ChannelId, _>` lists
/// strips the way a console lays them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChannelId {
    pub kind: ChannelKind,
    /// 1-based index; 0 for `main`
    pub index: u16,
}

impl ChannelId {
    pub const MAIN: ChannelId = ChannelId {
        kind: ChannelKind::Main,
        index: 0,
    };

    pub fn new(kind: ChannelKind, index: u16) -> Self {
        if kind == ChannelKind::Main {
            return Self::MAIN;
        }
        Self { kind, index }
    }

    pub fn input(index: u16) -> Self {
        Self::new(ChannelKind::Input, index)
    }

    pub fn aux(index: u16) -> Self {
        Self::new(ChannelKind::Aux, index)
    }

    pub fn fx_return(index: u16) -> Self {
        Self::new(ChannelKind::FxReturn, index)
    }

    pub fn fx_send(index: u16) -> Self {
        Self::new(ChannelKind::FxSend, index)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChannelKind::Main => write!(f, "main"),
            kind => write!(f, "{}_{}", kind.prefix(), self.index),
        }
    }
}

impl FromStr for ChannelId {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "main" {
            return Ok(Self::MAIN);
        }

        let invalid = || MixerError::InvalidChannel(s.to_string());
        let (prefix, index) = s.rsplit_once('_').ok_or_else(invalid)?;
        let kind = ChannelKind::from_prefix(prefix).ok_or_else(invalid)?;
        // Reject signs and leading zeros so the string form is canonical
        if index.is_empty() || index.starts_with('0') || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index: u16 = index.parse().map_err(|_| invalid())?;

        Ok(Self { kind, index })
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ChannelId {
    type Error = MixerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fixed channel-count profile of a console model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub input_channels: u16,
    pub aux_channels: u16,
    pub fx_returns: u16,
    pub fx_sends: u16,
    /// Recallable scenes, numbered from 1; 0 when the console has no recall
    pub scenes: u16,
    #[serde(default)]
    pub supports_meters: bool,
    #[serde(default)]
    pub supports_full_state: bool,
    #[serde(default)]
    pub supports_names: bool,
    #[serde(default)]
    pub supports_colors: bool,
}

impl DeviceCapabilities {
    /// Number of strips of a given kind
    pub fn count(&self, kind: ChannelKind) -> u16 {
        match kind {
            ChannelKind::Input => self.input_channels,
            ChannelKind::Aux => self.aux_channels,
            ChannelKind::FxReturn => self.fx_returns,
            ChannelKind::FxSend => self.fx_sends,
            ChannelKind::Main => 1,
        }
    }

    /// Whether the device can set `parameter` at all
    pub fn supports(&self, parameter: Parameter) -> bool {
        match parameter {
            Parameter::Fader | Parameter::Mute | Parameter::Pan => true,
            Parameter::Name => self.supports_names,
            Parameter::Color => self.supports_colors,
        }
    }

    /// Whether `id` addresses a strip this device has
    pub fn contains(&self, id: &ChannelId) -> bool {
        match id.kind {
            ChannelKind::Main => true,
            kind => id.index >= 1 && id.index <= self.count(kind),
        }
    }

    /// Every valid channel id, in console order
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids = Vec::new();
        for kind in [
            ChannelKind::Input,
            ChannelKind::Aux,
            ChannelKind::FxReturn,
            ChannelKind::FxSend,
        ] {
            ids.extend((1..=self.count(kind)).map(|i| ChannelId::new(kind, i)));
        }
        ids.push(ChannelId::MAIN);
        ids
    }
}

/// Longest channel name a console scribble strip shows
pub const MAX_NAME_LEN: usize = 12;

/// Scribble-strip palette: black, red, green, yellow, blue, purple, light blue, white
pub const COLOR_COUNT: u8 = 8;

/// Controllable channel parameters
///
/// Fader, mute and pan are mix parameters with a hardware value curve; name and
/// color are strip labels carried as text and a palette index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Fader,
    Mute,
    Pan,
    Name,
    Color,
}

impl Parameter {
    /// Parameters every board reports and `request_full_state` covers
    pub const MIX: [Parameter; 3] = [Parameter::Fader, Parameter::Mute, Parameter::Pan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Fader => "fader",
            Parameter::Mute => "mute",
            Parameter::Pan => "pan",
            Parameter::Name => "name",
            Parameter::Color => "color",
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Parameter::Name | Parameter::Color)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamValue {
    /// Fader in [0,1] or pan in [-1,1]
    Level(f64),
    /// Mute
    Toggle(bool),
    /// Channel name
    Text(String),
    /// Palette index, see [`COLOR_COUNT`]
    Color(u8),
}

impl ParamValue {
    pub fn as_level(&self) -> Option<f64> {
        match self {
            ParamValue::Level(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Equality tolerant of float noise from curve lookups
    pub fn matches(&self, other: &ParamValue) -> bool {
        match (self, other) {
            (ParamValue::Level(a), ParamValue::Level(b)) => (a - b).abs() < 1e-9,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Level(v) => write!(f, "{:.4}", v),
            ParamValue::Toggle(true) => write!(f, "on"),
            ParamValue::Toggle(false) => write!(f, "off"),
            ParamValue::Text(s) => write!(f, "{:?}", s),
            ParamValue::Color(c) => write!(f, "color {}", c),
        }
    }
}

/// One console strip as the rest of the world sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub index: u16,
    /// Normalized fader travel, 0.0 = -inf, 1.0 = top of travel
    pub fader: f64,
    pub mute: bool,
    /// -1.0 = hard left, 0.0 = center, 1.0 = hard right
    pub pan: f64,
    pub name: String,
    /// Scribble-strip palette index (0-7, white by default)
    pub color: u8,
    /// Parameters carrying an optimistic client value not yet echoed by hardware
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unconfirmed: BTreeSet<Parameter>,
}

impl Channel {
    /// Default strip for a freshly connected device
    pub fn new(id: ChannelId) -> Self {
        let name = match id.kind {
            ChannelKind::Main => "Main".to_string(),
            kind => format!("{} {}", kind.display_label(), id.index),
        };
        Self {
            id,
            kind: id.kind,
            index: id.index,
            fader: 0.0,
            mute: false,
            pan: 0.0,
            name,
            color: 7,
            unconfirmed: BTreeSet::new(),
        }
    }

    pub fn get(&self, parameter: Parameter) -> ParamValue {
        match parameter {
            Parameter::Fader => ParamValue::Level(self.fader),
            Parameter::Mute => ParamValue::Toggle(self.mute),
            Parameter::Pan => ParamValue::Level(self.pan),
            Parameter::Name => ParamValue::Text(self.name.clone()),
            Parameter::Color => ParamValue::Color(self.color),
        }
    }
}

/// Who produced a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Hardware,
    Client,
}

/// A single parameter change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub source: Source,
    pub channel_id: ChannelId,
    pub parameter: Parameter,
    pub value: ParamValue,
    pub sequence: u64,
}

/// Board plugin connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Connection status as published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub state: ConnectionState,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState, error: Option<String>) -> Self {
        Self {
            connected: state == ConnectionState::Connected,
            error,
            state,
        }
    }

    pub fn disconnected() -> Self {
        Self::new(ConnectionState::Disconnected, None)
    }
}

/// Meter levels, lossy and last-value-wins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterUpdate {
    pub levels: HashMap<ChannelId, f64>,
}

/// Identity of the connected console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Registry identifier (e.g. "xair-midi")
    pub board: String,
    pub manufacturer: String,
    pub model: String,
    pub connection: String,
}

/// Complete mixer state for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerState {
    pub device: DeviceInfo,
    pub capabilities: DeviceCapabilities,
    pub status: ConnectionStatus,
    pub channels: BTreeMap<ChannelId, Channel>,
    #[serde(default)]
    pub meters: HashMap<ChannelId, f64>,
}

impl MixerState {
    pub fn channels_of(&self, kind: ChannelKind) -> impl Iterator<Item = &Channel> {
        self.channels.values().filter(move |c| c.kind == kind)
    }
}
