//! Board plugins: one per console model
//!
//! A board owns a protocol adapter and knows the console's channel map and
//! value curves. Everything model-specific lives behind [`ConsoleModel`];
//! [`ConsoleBoard`] supplies the connection lifecycle and receive loop that all
//! models share.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MixerError, Result};
use crate::events::EventSender;
use crate::midi::nrpn::DEFAULT_NRPN_TIMEOUT_MS;
use crate::protocol::WireMessage;
use crate::state::SequenceClock;
use crate::translate::Translator;
use crate::types::{ChannelId, ConnectionStatus, DeviceCapabilities, DeviceInfo, ParamValue, Parameter};

pub mod allen_heath;
pub mod command8;
pub mod console;
pub mod registry;
pub mod xair;

pub use allen_heath::AllenHeathModel;
pub use command8::Command8Model;
pub use console::ConsoleBoard;
pub use registry::BoardRegistry;
pub use xair::{XAirMidiModel, XAirOscModel};

/// Board plugin trait - the uniform command/event contract for a console
///
/// All methods take `&self` so a board can be shared as `Arc<dyn BoardPlugin>`;
/// implementations use interior mutability for their connection state.
#[async_trait]
pub trait BoardPlugin: Send + Sync {
    /// Registry identifier plus model identity and last connection string
    fn device_info(&self) -> DeviceInfo;

    fn capabilities(&self) -> DeviceCapabilities;

    fn status(&self) -> ConnectionStatus;

    /// Value the console will report back after being sent `value`
    ///
    /// Fails without side effects when the board cannot address `parameter`
    /// on `channel`, so callers can check a command before acting on it.
    fn quantize(&self, channel: &ChannelId, parameter: Parameter, value: ParamValue) -> Result<ParamValue>;

    /// Open the transport and start receiving; a no-op when already connected
    async fn connect(&self, connection: &str) -> Result<()>;

    /// Stop receiving and release the transport; safe to call repeatedly
    async fn disconnect(&self);

    /// Send a fader level in [0,1]; returns the quantized value
    async fn set_fader(&self, channel: &ChannelId, value: f64) -> Result<ParamValue>;

    async fn set_mute(&self, channel: &ChannelId, muted: bool) -> Result<ParamValue>;

    /// Send a pan position in [-1,1]; returns the quantized value
    async fn set_pan(&self, channel: &ChannelId, value: f64) -> Result<ParamValue>;

    async fn set_channel_name(&self, channel: &ChannelId, name: &str) -> Result<ParamValue>;

    /// Send a scribble-strip palette index (0-7)
    async fn set_channel_color(&self, channel: &ChannelId, color: u8) -> Result<ParamValue>;

    /// Recall a stored scene, numbered from 1
    async fn recall_scene(&self, scene: u16) -> Result<()>;

    /// Ask the console to report every parameter; replies arrive as events
    async fn request_full_state(&self) -> Result<()>;
}

/// Options a board reads from configuration
#[derive(Debug, Clone)]
pub struct BoardOptions {
    /// Base MIDI channel (0-15) for models addressed on a single channel
    pub midi_channel: u8,
    pub nrpn_timeout: Duration,
    /// Name shown for our MIDI client
    pub client_name: String,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            midi_channel: 0,
            nrpn_timeout: Duration::from_millis(DEFAULT_NRPN_TIMEOUT_MS),
            client_name: "Mixer-GW".to_string(),
        }
    }
}

/// Everything a board needs from its session
#[derive(Clone)]
pub struct BoardContext {
    pub events: EventSender,
    pub sequence: Arc<SequenceClock>,
    pub options: BoardOptions,
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// One parameter report, still in hardware units
    Param {
        channel: ChannelId,
        parameter: Parameter,
        raw: u16,
    },
    /// Name or color report, already in client form
    Label {
        channel: ChannelId,
        parameter: Parameter,
        value: ParamValue,
    },
    /// Meter frame, levels in [0,1]
    Meters(HashMap<ChannelId, f64>),
}

/// Error for a parameter a model has no wire address for
pub(crate) fn unsupported(model: &str, parameter: Parameter) -> MixerError {
    MixerError::Unsupported(format!("{} cannot set channel {}", model, parameter))
}

/// Wire format of one console model
pub trait ConsoleModel: Send + Sync + 'static {
    fn manufacturer(&self) -> &str;

    fn model(&self) -> &str;

    fn capabilities(&self) -> DeviceCapabilities;

    /// Value curve of a mix parameter; `None` for labels
    fn translator(&self, parameter: Parameter) -> Option<&Translator>;

    /// Messages setting mix `parameter` on `channel` to `raw`
    ///
    /// Fails with `InvalidChannel` when the channel has no hardware address.
    fn encode(&self, channel: &ChannelId, parameter: Parameter, raw: u16) -> Result<Vec<WireMessage>>;

    /// Messages setting a name or color
    fn encode_label(&self, _channel: &ChannelId, parameter: Parameter, _value: &ParamValue) -> Result<Vec<WireMessage>> {
        Err(unsupported(self.model(), parameter))
    }

    /// `Ok(None)` for messages that are valid but not of interest
    fn decode(&self, message: &WireMessage) -> Result<Option<Decoded>>;

    /// Messages recalling `scene` (already checked against `capabilities().scenes`)
    fn scene_recall(&self, _scene: u16) -> Vec<WireMessage> {
        Vec::new()
    }

    /// Messages asking the console to report its full state
    fn full_state_request(&self) -> Vec<WireMessage> {
        Vec::new()
    }

    /// Messages to resend periodically to keep receiving updates
    fn keepalive(&self) -> Option<(Duration, Vec<WireMessage>)> {
        None
    }
}
