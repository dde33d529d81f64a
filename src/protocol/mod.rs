//! Protocol adapters: transport-level codecs for talking to a console
//!
//! An adapter owns one transport (a MIDI port pair or a UDP socket) and moves
//! [`WireMessage`]s across it. It knows nothing about channels or parameters;
//! that is the board's job.

use async_trait::async_trait;
use rosc::OscMessage;
use std::fmt;

use crate::error::Result;
use crate::midi::nrpn::Nrpn;
use crate::midi::MidiMessage;

pub mod midi;
pub mod osc;

#[cfg(test)]
pub mod mock;

pub use self::midi::MidiAdapter;
pub use self::osc::OscAdapter;

/// One logical message on the wire
///
/// An NRPN is a single logical message even though it travels as four
/// Control Changes; adapters send and receive it as a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Midi(MidiMessage),
    Nrpn(Nrpn),
    Osc(OscMessage),
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMessage::Midi(m) => write!(f, "{}", m),
            WireMessage::Nrpn(n) => write!(
                f,
                "NRPN ch:{} param:{:02X}/{:02X} value:{:02X}/{:02X}",
                n.channel + 1,
                n.param_msb,
                n.param_lsb,
                n.value_msb,
                n.value_lsb
            ),
            WireMessage::Osc(m) => write!(f, "OSC {} {:?}", m.addr, m.args),
        }
    }
}

/// Transport codec used by a board
///
/// All methods take `&self`; implementations keep their connection behind
/// interior mutability so the board can share the adapter between its command
/// path and its receive loop.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Short transport name for logs ("midi", "osc")
    fn name(&self) -> &str;

    /// Open the transport; `target` is the connection string
    async fn open(&self, target: &str) -> Result<()>;

    /// Release the transport and drop any partially received message
    async fn close(&self);

    /// Send one logical message; multi-part messages are never interleaved
    async fn send(&self, message: &WireMessage) -> Result<()>;

    /// Wait for the next complete inbound message
    ///
    /// `Ok(None)` means the transport closed. `Err(ProtocolDecode)` covers a
    /// single bad message and the caller should keep reading; `Err(Connection)`
    /// means the transport is gone.
    async fn receive(&self) -> Result<Option<WireMessage>>;
}
